//! The continuous display policy.

use super::effects::EffectSink;
use super::subscriber::{Subject, Subscriber};
use crate::common::TickCount;
use std::sync::Arc;

/// Re-derives the elapsed-time text on every tick.
pub struct ContinuousDisplayPolicy {
    sink: Arc<dyn EffectSink>,
}

impl ContinuousDisplayPolicy {
    pub fn new(sink: Arc<dyn EffectSink>) -> Self {
        Self { sink }
    }

    /// The text shown for `tick`.
    pub fn render(tick: TickCount) -> String {
        format!("elapsed: {tick} s")
    }
}

impl Subscriber for ContinuousDisplayPolicy {
    fn notify(&self, tick: TickCount, _subject: &dyn Subject) -> anyhow::Result<()> {
        self.sink.on_display(Self::render(tick));
        Ok(())
    }

    fn name(&self) -> &str {
        "display"
    }
}
