//! The delayed pulse policy.
//!
//! Once armed with a delay `d` at tick `t0`, the policy starts the pulse at
//! `t0 + d`, stops it two ticks later, and keeps repeating every `d` ticks until
//! it is disarmed. Delays of two ticks or less would let a stop land on or after
//! the next start, so `arm` rejects them.

use super::effects::EffectSink;
use super::subscriber::{Subject, Subscriber};
use crate::common::TickCount;
use crate::error::{Result, TickcastError};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Ticks between a start-effect and its stop-effect.
pub const PULSE_LENGTH: TickCount = 2;

#[derive(Debug, Default)]
struct PulseState {
    /// Tick at which the current wait window began.
    anchor: TickCount,
    delay: TickCount,
    armed: bool,
    playing: bool,
}

enum PulseFire {
    Start,
    Stop,
}

/// Fires a start/stop pair every `delay` ticks while armed.
pub struct DelayedPulsePolicy {
    subject: Box<dyn Subject>,
    sink: Arc<dyn EffectSink>,
    default_delay: TickCount,
    state: Mutex<PulseState>,
}

impl DelayedPulsePolicy {
    /// Creates a disarmed policy bound to `subject`.
    ///
    /// `default_delay` is what [`resume`](Self::resume) arms with when no delay
    /// has been accepted yet.
    pub fn new(
        subject: impl Subject + 'static,
        sink: Arc<dyn EffectSink>,
        default_delay: TickCount,
    ) -> Self {
        Self {
            subject: Box::new(subject),
            sink,
            default_delay,
            state: Mutex::new(PulseState::default()),
        }
    }

    /// Arms the policy: the first start fires `delay` ticks from now.
    ///
    /// Re-arming an armed policy restarts the wait window from the current tick.
    pub fn arm(&self, delay: TickCount) -> Result<()> {
        if delay <= PULSE_LENGTH {
            return Err(TickcastError::invalid(format!(
                "pulse delay must be greater than {PULSE_LENGTH} ticks, got {delay}"
            )));
        }
        let anchor = self.subject.state();
        if anchor.checked_add(delay).is_none() {
            return Err(TickcastError::invalid(format!(
                "pulse delay {delay} overflows the tick counter from tick {anchor}"
            )));
        }
        let mut state = self.lock();
        state.armed = true;
        state.delay = delay;
        state.anchor = anchor;
        debug!(delay, anchor, "Pulse armed.");
        Ok(())
    }

    /// Arms again with the last accepted delay, or the default if there is none.
    pub fn resume(&self) -> Result<()> {
        let delay = match self.lock().delay {
            0 => self.default_delay,
            delay => delay,
        };
        self.arm(delay)
    }

    /// Disarms the policy and asks for the pulse to stop right away.
    pub fn disarm(&self) {
        {
            let mut state = self.lock();
            state.armed = false;
            state.playing = false;
        }
        debug!("Pulse disarmed.");
        self.sink.on_pulse_stop();
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    /// The delay captured by the last successful `arm`, or 0 if never armed.
    pub fn delay(&self) -> TickCount {
        self.lock().delay
    }

    /// True between a start-effect and the stop that follows it.
    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PulseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evaluate(&self, tick: TickCount) -> Vec<PulseFire> {
        let mut fires = Vec::new();
        let mut state = self.lock();
        if !state.armed {
            return fires;
        }
        // A window that would end past the counter's range is never due.
        if state.anchor.checked_add(state.delay) == Some(tick) {
            state.anchor = tick;
            state.playing = true;
            fires.push(PulseFire::Start);
        }
        if state.playing && state.anchor.checked_add(PULSE_LENGTH) == Some(tick) {
            state.playing = false;
            fires.push(PulseFire::Stop);
        }
        fires
    }
}

impl Subscriber for DelayedPulsePolicy {
    fn notify(&self, tick: TickCount, _subject: &dyn Subject) -> anyhow::Result<()> {
        for fire in self.evaluate(tick) {
            match fire {
                PulseFire::Start => self.sink.on_pulse_start(),
                PulseFire::Stop => self.sink.on_pulse_stop(),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "pulse"
    }
}
