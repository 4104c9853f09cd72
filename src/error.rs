use std::time::Duration;

use crate::msg::SchemaTag;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("transport unreachable: {0}")]
    Unreachable(String),

    #[error("no answer from transport within {0:?}")]
    Timeout(Duration),

    #[error("transport worker is gone")]
    Closed,
}

/// Fatal to startup: a publisher cannot run without a topic binding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid topic name '{name}': {reason}")]
    InvalidTopic { name: String, reason: &'static str },

    #[error("topic '{topic}' is already registered as {registered}, not {requested}")]
    SchemaMismatch {
        topic: String,
        registered: SchemaTag,
        requested: SchemaTag,
    },

    #[error("publish interval must be positive, got {0:?}")]
    InvalidInterval(Duration),

    #[error("unable to reach transport")]
    Unreachable(#[from] ConnectError),

    #[error("no answer from transport within {0:?}")]
    Timeout(Duration),
}

/// Non-fatal: one missed interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("not connected: {reason}")]
    Disconnected { reason: String },

    #[error("topic '{0}' is not registered")]
    UnknownTopic(String),

    #[error("topic '{topic}' carries {expected}, got {actual}")]
    SchemaMismatch {
        topic: String,
        expected: SchemaTag,
        actual: SchemaTag,
    },

    #[error("publish queue is full")]
    QueueFull,

    #[error("publish queue is closed")]
    Closed,

    #[error("reconnect failed")]
    Reconnect(#[source] RegistrationError),
}

impl TransportError {
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::Disconnected {
            reason: reason.into(),
        }
    }

    /// Whether the publisher should reconnect before its next attempt.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. } | Self::Reconnect(_))
    }
}
