//! The capability every subscriber implements, and the read side of the tick
//! counter that subscribers receive alongside each notification.

use crate::common::TickCount;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Read access to the entity that owns the tick counter.
pub trait Subject: Send + Sync {
    /// The current tick count.
    fn state(&self) -> TickCount;

    /// Whether the periodic driver is currently running.
    fn is_active(&self) -> bool;
}

/// Something notified on every tick of the engine.
///
/// Handlers run synchronously on the driver task, one after another, so they
/// must not block. Anything slow belongs in the presentation layer, reached
/// through an [`EffectSink`](super::effects::EffectSink).
///
/// Returning an error does not stop the broadcast: the engine records the
/// failure and moves on to the next subscriber.
pub trait Subscriber: Send + Sync {
    fn notify(&self, tick: TickCount, subject: &dyn Subject) -> anyhow::Result<()>;

    /// A short label used in diagnostics.
    fn name(&self) -> &str {
        "subscriber"
    }
}

/// A cheap, cloneable view of the engine's counter and active flag.
///
/// The engine writes through its own copy while holding the registry lock;
/// every other holder only reads, so policies can query the current tick
/// without touching that lock.
#[derive(Debug, Clone, Default)]
pub struct TickHandle {
    tick: Arc<AtomicU64>,
    active: Arc<AtomicBool>,
}

impl TickHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn store(&self, tick: TickCount) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    /// Advances the counter by one, holding at `TickCount::MAX`.
    pub(crate) fn increment(&self) -> TickCount {
        let next = self.tick.load(Ordering::SeqCst).saturating_add(1);
        self.tick.store(next, Ordering::SeqCst);
        next
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl Subject for TickHandle {
    fn state(&self) -> TickCount {
        self.tick.load(Ordering::SeqCst)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_saturates_at_the_counter_limit() {
        let handle = TickHandle::new();
        handle.store(TickCount::MAX - 1);

        assert_eq!(handle.increment(), TickCount::MAX);
        assert_eq!(handle.increment(), TickCount::MAX);
        assert_eq!(handle.state(), TickCount::MAX);
    }
}
