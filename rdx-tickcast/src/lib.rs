//! # Tickcast
//!
//! A one-second tick source that broadcasts to reactive timing policies.
//!
//! Tickcast owns an elapsed-seconds counter and, while started, advances it once
//! per period and notifies every registered subscriber, synchronously and in
//! registration order. Subscribers decide; they never perform effects
//! themselves. Decisions leave the core through an `EffectSink`, which a
//! presentation layer implements on its own task or thread.
//!
//! ## Core Concepts
//!
//! - **TickEngine**: the subject. Owns the counter, the subscriber registry and
//!   the `start`/`stop` lifecycle of the periodic driver.
//! - **Subscriber**: the capability every policy implements.
//! - **Policies**: `ContinuousDisplayPolicy` (every tick), `DelayedPulsePolicy`
//!   (start/stop pairs every `delay` ticks once armed) and
//!   `PeriodicTogglePolicy` (direction flips on multiples of a period).
//! - **Events**: `SystemEvent`s for diagnostics, `Effect`s for presentation.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tickcast::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = TickEngine::new(TickcastConfig::default())?;
//!     let sink: Arc<dyn EffectSink> = Arc::new(engine.effect_sink());
//!
//!     let mut effects = engine.subscribe_effects();
//!     tokio::spawn(async move {
//!         while let Ok(effect) = effects.recv().await {
//!             println!("{effect:?}");
//!         }
//!     });
//!
//!     engine.attach(Arc::new(ContinuousDisplayPolicy::new(sink))).await;
//!     engine.run().await?;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Tickcast Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
mod time;

/// A prelude module for easy importing of the most common Tickcast types.
pub mod prelude {
    pub use crate::common::{Direction, SubscriberId, Tint, TickCount};
    pub use crate::components::display::ContinuousDisplayPolicy;
    pub use crate::components::effects::{ChannelSink, EffectSink, RecordingSink};
    pub use crate::components::pulse::DelayedPulsePolicy;
    pub use crate::components::subscriber::{Subject, Subscriber, TickHandle};
    pub use crate::components::toggle::PeriodicTogglePolicy;
    pub use crate::config::TickcastConfig;
    pub use crate::engine::TickEngine;
    pub use crate::error::TickcastError;
    pub use crate::events::{Effect, SystemEvent};
}
