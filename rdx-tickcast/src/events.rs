//! Defines all public event types broadcast by the Tickcast engine.
//!
//! Two streams leave the core. [`SystemEvent`]s describe the engine itself
//! (lifecycle, registry changes, misbehaving subscribers). [`Effect`]s are the
//! decisions made by policies, handed to whatever presentation layer listens.

use crate::common::{Direction, SubscriberId, TickCount};
use chrono::{DateTime, Utc};

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    /// Fired when the periodic driver is spawned.
    ClockStarted { at: DateTime<Utc> },
    /// Fired once the driver has been joined; `tick` is the count it stopped at.
    ClockStopped { tick: TickCount },
    /// Fired when a subscriber is registered.
    SubscriberAttached { id: SubscriberId },
    /// Fired when a registration is removed.
    SubscriberDetached { id: SubscriberId },
    /// A subscriber's handler returned an error or panicked during dispatch.
    /// Dispatch carried on with the remaining subscribers.
    SubscriberFailed {
        id: SubscriberId,
        tick: TickCount,
        reason: String,
    },
}

/// A side effect requested by a policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace the elapsed-time display with `text`.
    Display { text: String },
    /// Begin playing the pulse.
    PulseStart,
    /// Stop the pulse if it is playing.
    PulseStop,
    /// Restart the transition, now travelling in `direction`.
    Toggle {
        direction: Direction,
        from_offset: f64,
        to_offset: f64,
    },
}
