//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Body of `POST /api/v1/command/new`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct NewCommand {
    /// Command line to execute.
    pub command: String,
}

/// Cursor parameters of the list endpoints.
///
/// `before` is an exclusive upper bound on ids; empty or absent means
/// "start from the newest". `limit` is kept as raw text so the server can
/// report malformed values as validation errors.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
pub struct PageQuery {
    #[serde(default)]
    pub before: Option<String>,

    #[serde(default)]
    pub limit: Option<String>,
}

/// Response of `POST /api/v1/command/{id}/stop`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
pub struct StopResponse {
    /// `true` when this request moved the command to its terminal status,
    /// `false` when the command had already finished.
    pub stopped: bool,
}

/// Error body returned with every non-2xx response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct ErrorBody {
    pub error: String,
}
