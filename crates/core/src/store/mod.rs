//! Durable command and log history.
//!
//! The runner and the HTTP layer only talk to the [`Store`] trait. Two
//! implementations are provided:
//! - [`SqliteStore`]: the on-disk store used by the server
//! - [`MemoryStore`]: an ephemeral store for tests and throwaway runs
//!
//! Both page with the same cursor scheme: `before` is an exclusive upper
//! bound on ids (empty means newest), results are ordered by id descending
//! and capped at `limit`.

mod error;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use ck_protocol::{Command, CommandStatus, LogRecord};

#[async_trait]
pub trait Store: Send + Sync {
    /// Record a new command with a fresh id, the current time and `IDLE`
    /// status.
    async fn new_command(&self, command_line: &str) -> StoreResult<Command>;

    /// Fetch a command by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such command exists.
    async fn get_command(&self, id: &str) -> StoreResult<Command>;

    /// Up to `limit` commands with id below `before`, newest first.
    async fn list_commands(&self, before: &str, limit: usize) -> StoreResult<Vec<Command>>;

    /// Append one log record.
    async fn add_log(&self, record: &LogRecord) -> StoreResult<()>;

    /// Up to `limit` records of one command with id below `before`, newest
    /// first.
    async fn get_logs(
        &self,
        command_id: &str,
        before: &str,
        limit: usize,
    ) -> StoreResult<Vec<LogRecord>>;

    /// Move a command to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids and
    /// [`StoreError::InvalidTransition`] when the state machine forbids the
    /// move (including any move out of a terminal status).
    async fn update_status(&self, id: &str, status: CommandStatus) -> StoreResult<()>;
}

/// Shared check for `update_status` implementations.
pub(crate) fn check_transition(
    id: &str,
    from: CommandStatus,
    to: CommandStatus,
) -> StoreResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        })
    }
}
