//! Defines all configuration structures for the Tickcast engine.
//!
//! These structs are deserialized with `serde` from layered sources: an
//! optional TOML file and `TICKCAST_*` environment variables. Every field has a
//! default, so an empty source yields the stock one-second engine with a
//! five-second pulse delay and a twenty-second toggle period.

use crate::error::{Result, TickcastError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The top-level configuration for the `TickEngine` and its policies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickcastConfig {
    /// Milliseconds between two ticks of the periodic driver.
    pub tick_period_ms: u64,

    /// Settings for the delayed pulse policy.
    pub pulse: PulseConfig,

    /// Settings for the periodic toggle policy.
    pub toggle: ToggleConfig,
}

/// Settings for the `DelayedPulsePolicy`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Delay applied by `resume` when the policy was never armed explicitly.
    pub default_delay: u64,
}

/// Settings for the `PeriodicTogglePolicy`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    /// Fire on every positive multiple of this many ticks.
    pub period: u64,
    /// Length of the transition the toggle effect animates across.
    pub distance: f64,
}

impl Default for TickcastConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            pulse: PulseConfig::default(),
            toggle: ToggleConfig::default(),
        }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self { default_delay: 5 }
    }
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self {
            period: 20,
            distance: 150.0,
        }
    }
}

impl TickcastConfig {
    /// Loads configuration from an optional TOML file, then lets `TICKCAST_*`
    /// environment variables override it (`TICKCAST_PULSE__DEFAULT_DELAY=8`).
    ///
    /// The merged result is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TICKCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: TickcastConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(TickcastError::invalid("tick_period_ms must be at least 1"));
        }
        if self.pulse.default_delay <= 2 {
            return Err(TickcastError::invalid(format!(
                "pulse.default_delay must be greater than 2, got {}",
                self.pulse.default_delay
            )));
        }
        if self.toggle.period == 0 {
            return Err(TickcastError::invalid("toggle.period must be at least 1"));
        }
        if !self.toggle.distance.is_finite() {
            return Err(TickcastError::invalid("toggle.distance must be finite"));
        }
        Ok(())
    }

    /// The driver period as a `Duration`.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_describe_a_one_second_engine() {
        let config = TickcastConfig::default();
        assert_eq!(config.tick_period(), Duration::from_secs(1));
        assert_eq!(config.pulse.default_delay, 5);
        assert_eq!(config.toggle.period, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("tickcast-{}.toml", std::process::id()));
        fs::write(
            &path,
            "tick_period_ms = 250\n[toggle]\nperiod = 7\n",
        )
        .unwrap();

        let config = TickcastConfig::load(Some(&path)).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.tick_period_ms, 250);
        assert_eq!(config.toggle.period, 7);
        assert_eq!(config.toggle.distance, 150.0);
        assert_eq!(config.pulse.default_delay, 5);
    }

    #[test]
    fn rejects_short_pulse_delay() {
        let mut config = TickcastConfig::default();
        config.pulse.default_delay = 2;
        assert!(matches!(
            config.validate(),
            Err(TickcastError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn rejects_zero_period() {
        let mut config = TickcastConfig::default();
        config.toggle.period = 0;
        assert!(config.validate().is_err());

        let mut config = TickcastConfig::default();
        config.tick_period_ms = 0;
        assert!(config.validate().is_err());
    }
}
