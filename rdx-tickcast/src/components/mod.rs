//! The subscriber capability and the timing policies built on it.
//!
//! - `subscriber`: the `Subject`/`Subscriber` traits and the shared tick handle.
//! - `effects`: the sink policies hand their decisions to.
//! - `display`, `pulse`, `toggle`: the three policies.

pub mod display;
pub mod effects;
pub mod pulse;
pub mod subscriber;
pub mod toggle;
