//! Where policy decisions leave the core.
//!
//! Policies call an [`EffectSink`] and never look at what happens next. A sink
//! must return immediately; the stock [`ChannelSink`] pushes onto a broadcast
//! channel and lets the presentation layer pick effects up on its own task.

use crate::common::Direction;
use crate::events::Effect;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// The presentation layer's side of the boundary.
pub trait EffectSink: Send + Sync {
    fn on_display(&self, text: String);
    fn on_pulse_start(&self);
    fn on_pulse_stop(&self);
    fn on_toggle(&self, direction: Direction, from_offset: f64, to_offset: f64);
}

/// Forwards every effect into a broadcast channel.
///
/// Sends never block; effects raised while nobody is listening are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<Effect>,
}

impl ChannelSink {
    pub fn new(sender: broadcast::Sender<Effect>) -> Self {
        Self { sender }
    }

    fn emit(&self, effect: Effect) {
        self.sender.send(effect).ok();
    }
}

impl EffectSink for ChannelSink {
    fn on_display(&self, text: String) {
        self.emit(Effect::Display { text });
    }

    fn on_pulse_start(&self) {
        self.emit(Effect::PulseStart);
    }

    fn on_pulse_stop(&self) {
        self.emit(Effect::PulseStop);
    }

    fn on_toggle(&self, direction: Direction, from_offset: f64, to_offset: f64) {
        self.emit(Effect::Toggle {
            direction,
            from_offset,
            to_offset,
        });
    }
}

/// Keeps every effect in memory, in the order it was raised.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    effects: Arc<Mutex<Vec<Effect>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drains the recorded effects.
    pub fn take(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn push(&self, effect: Effect) {
        self.effects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(effect);
    }
}

impl EffectSink for RecordingSink {
    fn on_display(&self, text: String) {
        self.push(Effect::Display { text });
    }

    fn on_pulse_start(&self) {
        self.push(Effect::PulseStart);
    }

    fn on_pulse_stop(&self) {
        self.push(Effect::PulseStop);
    }

    fn on_toggle(&self, direction: Direction, from_offset: f64, to_offset: f64) {
        self.push(Effect::Toggle {
            direction,
            from_offset,
            to_offset,
        });
    }
}
