//! Command models and the command status state machine.
//!
//! A `Command` is created once when a client submits a command line and is
//! then driven through its lifecycle by the runner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Lifecycle status of a submitted command.
///
/// The status progresses through these states:
/// Idle -> Running -> Exited
///
/// Failure paths:
/// - Idle -> Error: the process could not be started
/// - Running -> Error: waiting failed, the exit status reported failure,
///   or the command was stopped
///
/// `Exited` and `Error` are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    /// Command has been recorded but its process has not started yet.
    Idle,

    /// Process is executing.
    Running,

    /// Process exited successfully.
    Exited,

    /// Process failed to start, failed while running, or was stopped.
    Error,
}

impl CommandStatus {
    /// Returns `true` for statuses no transition may leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exited | Self::Error)
    }

    /// Returns `true` if moving from `self` to `next` is a legal edge.
    pub fn can_transition_to(self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Idle, Self::Error)
                | (Self::Running, Self::Exited)
                | (Self::Running, Self::Error)
        )
    }

    /// The canonical upper-case name, as stored and sent over the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Exited => "EXITED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for CommandStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(Self::Idle),
            "RUNNING" => Ok(Self::Running),
            "EXITED" => Ok(Self::Exited),
            "ERROR" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A command submitted for execution.
///
/// Identifiers are monotonically sortable, so listing commands by id
/// descending yields newest first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Unique, monotonically sortable identifier.
    pub id: String,

    /// RFC 3339 creation timestamp (UTC).
    pub created_at: String,

    /// The command line as submitted.
    pub command: String,

    /// Current lifecycle status.
    pub status: CommandStatus,
}

impl Command {
    /// Returns a copy of this command carrying `status`.
    pub fn with_status(&self, status: CommandStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}
