//! Offline log playback.
//!
//! Loads a pre-recorded, timestamped message log and replays it to per-topic
//! subscribers on a virtual clock, with play/pause, seeking and stop, as if
//! the messages were arriving live from a publish/subscribe bus.

pub mod config;
pub mod core;
pub mod error;
pub mod input;
pub mod playback;

pub use error::{BagpiperError, Result};
