//! Error types for the Tickcast engine.
//!
//! Nothing here is fatal to the process. Configuration mistakes are rejected at
//! the call that supplied them and leave the callee's state untouched.

/// Errors returned by the engine's control surface.
#[derive(Debug, thiserror::Error)]
pub enum TickcastError {
    /// A non-positive or otherwise unusable delay, period, or interval.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Explanation of what is wrong with the supplied value.
        reason: String,
    },

    /// Loading or deserializing configuration sources failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: config::ConfigError,
    },
}

impl TickcastError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = TickcastError> = std::result::Result<T, E>;
