//! Status-change events delivered on the shared command topic.
//!
//! Every status transition of every command is published as one
//! `CommandEvent`. Live clients receive them as server-sent events.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::command_models::{Command, CommandStatus};

/// What happened to the command carried by a [`CommandEvent`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum CommandEventKind {
    /// The command was submitted and recorded with `IDLE` status.
    Create,

    /// The command's status changed.
    Update,

    /// The command was removed from history.
    Delete,
}

/// A command snapshot tagged with the kind of change.
///
/// Serialized flat, with the command's fields next to `type`:
/// ```json
/// {
///   "id": "0192…",
///   "createdAt": "2024-05-01T10:00:00.000000000Z",
///   "command": "echo hi",
///   "status": "RUNNING",
///   "type": "update"
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct CommandEvent {
    #[serde(flatten)]
    pub command: Command,

    #[serde(rename = "type")]
    pub kind: CommandEventKind,
}

impl CommandEvent {
    pub fn created(command: Command) -> Self {
        Self {
            command,
            kind: CommandEventKind::Create,
        }
    }

    pub fn updated(command: Command) -> Self {
        Self {
            command,
            kind: CommandEventKind::Update,
        }
    }

    /// Shorthand for the status carried by this event.
    pub fn status(&self) -> CommandStatus {
        self.command.status
    }
}
