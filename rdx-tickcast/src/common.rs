//! Contains common, primitive types shared across the Tickcast engine.
//!
//! This module defines the tick counter type, the key type used to identify
//! registered subscribers, and the binary direction state that the toggle
//! policy flips on every fire.

use slotmap::new_key_type;

/// The elapsed-seconds counter owned by the engine.
///
/// It starts at zero and only ever grows while the engine is active.
pub type TickCount = u64;

new_key_type! {
    /// Uniquely identifies one registration of a subscriber with the engine.
    ///
    /// Attaching the same subscriber twice produces two distinct ids, one per
    /// registration. Keys are never reused, so a stale id cannot detach an
    /// unrelated subscriber.
    pub struct SubscriberId;
}

/// The direction a toggled visual transition is currently travelling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Right,
    Left,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            Direction::Right => Direction::Left,
            Direction::Left => Direction::Right,
        }
    }

    /// The tint a presentation layer paints while moving in this direction.
    pub fn tint(self) -> Tint {
        match self {
            Direction::Right => Tint::Green,
            Direction::Left => Tint::Blue,
        }
    }

    /// The `(from, to)` offsets of a transition travelling in this direction
    /// across `distance` units.
    pub fn offsets(self, distance: f64) -> (f64, f64) {
        match self {
            Direction::Right => (0.0, distance),
            Direction::Left => (distance, 0.0),
        }
    }
}

/// Colour paired with a [`Direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tint {
    Green,
    Blue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_flips_and_swaps_offsets() {
        let dir = Direction::default();
        assert_eq!(dir, Direction::Right);
        assert_eq!(dir.offsets(150.0), (0.0, 150.0));

        let back = dir.flipped();
        assert_eq!(back, Direction::Left);
        assert_eq!(back.offsets(150.0), (150.0, 0.0));
        assert_eq!(back.tint(), Tint::Blue);
        assert_eq!(back.flipped(), Direction::Right);
    }
}
