//! Configuration models for `cockpit.toml`.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:4000"
//! max_page_size = 500
//!
//! [database]
//! path = "cockpit.db"
//!
//! [runner]
//! shell = ["bash", "-c"]
//! subscriber_capacity = 16
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bus::DEFAULT_SUBSCRIBER_CAPACITY;

/// Unified application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub runner: RunnerConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,

    /// Largest `limit` accepted by the list endpoints.
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:4000".to_string(),
            max_page_size: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file, created on first start.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cockpit.db"),
        }
    }
}

/// How submitted command lines are turned into processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Launcher prefix such as `["bash", "-c"]`; the command line is passed
    /// as the final argument.
    ///
    /// When absent the command line is split shell-style and executed
    /// directly, so a missing binary fails at spawn time.
    pub shell: Option<Vec<String>>,

    /// Values buffered per live subscriber before publishers wait.
    pub subscriber_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: None,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}
