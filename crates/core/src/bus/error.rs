//! Error types for event bus operations.

use thiserror::Error;

/// Result type for event bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors returned synchronously by [`EventBus`](super::EventBus) and
/// [`Topic`](super::Topic) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A topic with this name is already registered.
    #[error("topic {0} already exists")]
    AlreadyExists(String),

    /// No topic with this name is registered.
    #[error("topic {0} does not exist")]
    NotFound(String),

    /// The topic exists but carries a different value type.
    #[error("topic {topic} carries {actual}, not {requested}")]
    TypeMismatch {
        topic: String,
        requested: &'static str,
        actual: &'static str,
    },

    /// The topic handle was closed.
    #[error("topic {0} is closed")]
    Closed(String),
}
