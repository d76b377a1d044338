//! The periodic toggle policy.

use super::effects::EffectSink;
use super::subscriber::{Subject, Subscriber};
use crate::common::{Direction, TickCount};
use crate::error::{Result, TickcastError};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug)]
struct ToggleState {
    period: TickCount,
    last_fired: Option<TickCount>,
    direction: Direction,
}

/// Flips direction on every positive multiple of `period`.
///
/// A given tick value fires at most once, even if it is delivered again or the
/// period changes so that it would qualify a second time.
pub struct PeriodicTogglePolicy {
    sink: Arc<dyn EffectSink>,
    distance: f64,
    state: Mutex<ToggleState>,
}

impl PeriodicTogglePolicy {
    pub fn new(sink: Arc<dyn EffectSink>, period: TickCount, distance: f64) -> Result<Self> {
        check_period(period)?;
        Ok(Self {
            sink,
            distance,
            state: Mutex::new(ToggleState {
                period,
                last_fired: None,
                direction: Direction::default(),
            }),
        })
    }

    /// Changes the period; it applies from the next notification.
    pub fn set_period(&self, period: TickCount) -> Result<()> {
        check_period(period)?;
        self.lock().period = period;
        debug!(period, "Toggle period changed.");
        Ok(())
    }

    pub fn period(&self) -> TickCount {
        self.lock().period
    }

    pub fn direction(&self) -> Direction {
        self.lock().direction
    }

    /// The last tick that produced a fire.
    pub fn last_fired(&self) -> Option<TickCount> {
        self.lock().last_fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ToggleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evaluate(&self, tick: TickCount) -> Option<Direction> {
        let mut state = self.lock();
        let due = tick > 0 && tick % state.period == 0 && state.last_fired != Some(tick);
        if !due {
            return None;
        }
        state.last_fired = Some(tick);
        state.direction = state.direction.flipped();
        Some(state.direction)
    }
}

fn check_period(period: TickCount) -> Result<()> {
    if period == 0 {
        return Err(TickcastError::invalid("toggle period must be at least 1 tick"));
    }
    Ok(())
}

impl Subscriber for PeriodicTogglePolicy {
    fn notify(&self, tick: TickCount, _subject: &dyn Subject) -> anyhow::Result<()> {
        if let Some(direction) = self.evaluate(tick) {
            let (from, to) = direction.offsets(self.distance);
            self.sink.on_toggle(direction, from, to);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "toggle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::effects::RecordingSink;
    use crate::components::subscriber::TickHandle;
    use crate::events::Effect;

    fn policy(period: TickCount) -> (PeriodicTogglePolicy, RecordingSink) {
        let sink = RecordingSink::new();
        let policy = PeriodicTogglePolicy::new(Arc::new(sink.clone()), period, 150.0).unwrap();
        (policy, sink)
    }

    #[test]
    fn fires_on_multiples_and_alternates_direction() {
        let (policy, sink) = policy(20);
        let subject = TickHandle::new();

        for tick in 1..20 {
            policy.notify(tick, &subject).unwrap();
        }
        assert!(sink.take().is_empty());

        policy.notify(20, &subject).unwrap();
        assert_eq!(
            sink.take(),
            vec![Effect::Toggle {
                direction: Direction::Left,
                from_offset: 150.0,
                to_offset: 0.0,
            }]
        );

        for tick in 21..=40 {
            policy.notify(tick, &subject).unwrap();
        }
        assert_eq!(
            sink.take(),
            vec![Effect::Toggle {
                direction: Direction::Right,
                from_offset: 0.0,
                to_offset: 150.0,
            }]
        );
        assert_eq!(policy.last_fired(), Some(40));
    }

    #[test]
    fn repeated_tick_fires_once() {
        let (policy, sink) = policy(4);
        let subject = TickHandle::new();

        policy.notify(4, &subject).unwrap();
        policy.notify(4, &subject).unwrap();
        assert_eq!(sink.take().len(), 1);
        assert_eq!(policy.direction(), Direction::Left);
    }

    #[test]
    fn period_change_cannot_refire_consumed_tick() {
        let (policy, sink) = policy(6);
        let subject = TickHandle::new();

        policy.notify(6, &subject).unwrap();
        policy.set_period(3).unwrap();
        policy.notify(6, &subject).unwrap();
        assert_eq!(sink.take().len(), 1);

        policy.notify(9, &subject).unwrap();
        assert_eq!(sink.take().len(), 1);
        assert_eq!(policy.period(), 3);
    }

    #[test]
    fn tick_zero_never_fires() {
        let (policy, sink) = policy(1);
        policy.notify(0, &TickHandle::new()).unwrap();
        assert!(sink.take().is_empty());
    }

    #[test]
    fn zero_period_is_rejected() {
        let (policy, _sink) = policy(5);
        assert!(matches!(
            policy.set_period(0),
            Err(TickcastError::InvalidConfiguration { .. })
        ));
        assert_eq!(policy.period(), 5);

        let sink: Arc<dyn EffectSink> = Arc::new(RecordingSink::new());
        assert!(PeriodicTogglePolicy::new(sink, 0, 150.0).is_err());
    }
}
