//! Log record models.
//!
//! Each line a command writes to stdout or stderr becomes one `LogRecord`.
//! The runner also emits synthetic records when a command fails to start,
//! fails while running, or is stopped.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Where a log line came from.
///
/// Serialized as the numeric `fd` the web client expects:
/// `1` for stdout, `2` for stderr and `-1` for runner-generated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSource {
    Stdout,
    Stderr,
    /// Synthetic record describing an execution failure.
    InternalError,
}

impl LogSource {
    pub fn fd(self) -> i64 {
        match self {
            Self::Stdout => 1,
            Self::Stderr => 2,
            Self::InternalError => -1,
        }
    }

    pub fn from_fd(fd: i64) -> Option<Self> {
        match fd {
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            -1 => Some(Self::InternalError),
            _ => None,
        }
    }

    /// Short name used in log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::InternalError => "internal-error",
        }
    }
}

impl Serialize for LogSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.fd())
    }
}

impl<'de> Deserialize<'de> for LogSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fd = i64::deserialize(deserializer)?;
        LogSource::from_fd(fd)
            .ok_or_else(|| serde::de::Error::custom(format!("expected fd 1, 2 or -1, got {fd}")))
    }
}

/// One line of output (or one synthetic failure message) of a command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Monotonically sortable identifier.
    pub id: String,

    /// Id of the command that produced this line.
    pub command_id: String,

    /// RFC 3339 creation timestamp (UTC).
    pub created_at: String,

    /// Line content without its trailing newline.
    pub content: String,

    #[serde(rename = "fd")]
    #[ts(type = "1 | 2 | -1")]
    pub source: LogSource,
}
