//! Error types for store operations.

use ck_protocol::CommandStatus;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing history.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No command with this id exists.
    #[error("command {0} not found")]
    NotFound(String),

    /// The requested status change is not a legal transition.
    #[error("command {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: CommandStatus,
        to: CommandStatus,
    },

    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be mapped back to a protocol type.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// The blocking worker running a query panicked or was cancelled.
    #[error("store worker failed: {0}")]
    Worker(String),
}
