use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tickcast::prelude::*;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load configuration: an optional TOML path, then TICKCAST_* overrides.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = TickcastConfig::load(config_path.as_deref())?;

    // 3. Create the engine and the sink every policy reports to.
    let engine = TickEngine::new(config)?;
    let sink: Arc<dyn EffectSink> = Arc::new(engine.effect_sink());

    // 4. Render effects and diagnostics on their own tasks.
    spawn_event_listeners(&engine);

    // 5. Register the three policies, pulse armed with its default delay.
    let config = engine.config().clone();
    let pulse = Arc::new(DelayedPulsePolicy::new(
        engine.subject(),
        sink.clone(),
        config.pulse.default_delay,
    ));
    pulse.resume()?;
    let toggle = Arc::new(PeriodicTogglePolicy::new(
        sink.clone(),
        config.toggle.period,
        config.toggle.distance,
    )?);

    engine.attach(Arc::new(ContinuousDisplayPolicy::new(sink))).await;
    engine.attach(pulse).await;
    engine.attach(toggle).await;

    // 6. Run until Ctrl+C.
    info!("{} v{} ready.", tickcast::ENGINE_NAME.cyan(), tickcast::VERSION);
    engine.run().await?;

    Ok(())
}

/// Spawns one task per event stream the engine publishes.
fn spawn_event_listeners(engine: &TickEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut effect_rx = engine.subscribe_effects();
    tokio::spawn(async move {
        loop {
            let effect = match effect_rx.recv().await {
                Ok(effect) => effect,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Effect listener fell behind.");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match effect {
                Effect::Display { text } => info!("[DISPLAY] {}", text.bold()),
                Effect::PulseStart => info!("[PULSE] {}", "playing".green()),
                Effect::PulseStop => info!("[PULSE] {}", "stopped".dimmed()),
                Effect::Toggle {
                    direction,
                    from_offset,
                    to_offset,
                } => info!(
                    "[TOGGLE] {:?} ({:?}) {} -> {}",
                    direction,
                    direction.tint(),
                    from_offset,
                    to_offset
                ),
            }
        }
    });
}
