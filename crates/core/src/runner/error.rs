//! Error types for the runner.

use ck_protocol::CommandStatus;
use thiserror::Error;

use crate::bus::BusError;
use crate::store::StoreError;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors returned to callers of the runner.
///
/// Failures of the command itself are not errors here: they end in the
/// `ERROR` status and a synthetic log record.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A live session already owns this command id.
    #[error("command {0} is already running")]
    AlreadyRunning(String),

    /// Only `IDLE` commands can be started.
    #[error("command {id} is {status}, only IDLE commands can run")]
    NotIdle { id: String, status: CommandStatus },

    /// No live session exists for this command id.
    #[error("no running command {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a process could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("empty command line")]
    Empty,

    #[error("cannot parse command line: unbalanced quoting")]
    Unparsable,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}
