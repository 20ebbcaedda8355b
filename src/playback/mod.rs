pub mod buffer;
pub mod driver;
pub mod engine;
pub mod subscription;

pub use buffer::TopicBuffer;
pub use driver::{PlaybackDriver, SharedEngine};
pub use engine::{LogBounds, PlaybackEngine};
pub use subscription::{SubscriptionId, SubscriptionRegistry};

use crate::core::BagMessage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Play/pause state and elapsed whole seconds, sent to the control listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    pub is_playing: bool,
    pub current_time_s: u64,
}

/// topic -> message type name
pub type TopicTypeMap = BTreeMap<String, String>;

/// Topic subscriber callback.
///
/// Called with `Some(message)` for each delivered message and with `None`
/// as a reset signal when playback stops or seeks. Identity is the `Arc`
/// allocation: clones of one `Callback` are the same subscriber.
pub type Callback = Arc<dyn Fn(Option<&BagMessage>) + Send + Sync>;

/// Control listener callback
pub type ControlCallback = Box<dyn Fn(ControlMessage) + Send + Sync>;

/// Wrap a closure as a subscriber callback
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(Option<&BagMessage>) + Send + Sync + 'static,
{
    Arc::new(f)
}
