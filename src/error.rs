//! Error types for playback operations

use std::time::Duration;

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, BagpiperError>;

#[derive(Debug, thiserror::Error)]
pub enum BagpiperError {
    /// Unsubscribe of a callback that was never subscribed
    #[error("callback is not registered with the player")]
    CallbackNotRegistered,

    /// Reverse lookup points at a topic the forward map does not hold
    #[error("callback is registered for topic {topic} but the topic has no subscriber list")]
    InconsistentSubscription { topic: String },

    #[error("callback is already subscribed to topic {topic}")]
    CallbackAlreadyRegistered { topic: String },

    #[error("topic {0} is not stored on the player")]
    UnknownTopic(String),

    #[error("topic {0} does not exist on the player or its message store is empty")]
    NoMessages(String),

    #[error("field {path} not found in message")]
    FieldNotFound { path: String },

    #[error("message has no header.stamp")]
    MissingTimestamp,

    /// Tick periods must be non-zero and below one second
    #[error("invalid tick period {0:?}")]
    InvalidTickPeriod(Duration),

    #[error(transparent)]
    Ingestion(#[from] anyhow::Error),
}
