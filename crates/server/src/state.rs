//! Shared handler state and its construction from configuration.

use std::sync::Arc;

use ck_core::bus::EventBus;
use ck_core::config::models::AppConfig;
use ck_core::ids::IdGenerator;
use ck_core::runner::{Launcher, Runner};
use ck_core::store::{SqliteStore, Store};
use tracing::info;

use crate::error::ServerResult;

#[derive(Clone)]
pub struct AppState {
    pub runner: Runner,
    pub store: Arc<dyn Store>,
    /// Largest `limit` accepted by the list endpoints.
    pub max_page_size: usize,
}

impl AppState {
    pub fn new(runner: Runner, store: Arc<dyn Store>, max_page_size: usize) -> Self {
        Self {
            runner,
            store,
            max_page_size,
        }
    }

    /// Open the SQLite store and wire a bus and runner around it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: &AppConfig) -> ServerResult<Self> {
        let ids = Arc::new(IdGenerator::new());
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(
            &config.database.path,
            Arc::clone(&ids),
        )?);
        info!(path = %config.database.path.display(), "database ready");

        let bus = Arc::new(EventBus::with_capacity(config.runner.subscriber_capacity));
        let launcher = Launcher::from_shell(config.runner.shell.as_deref());
        let runner = Runner::new(bus, Arc::clone(&store), ids, launcher)?;

        Ok(Self::new(runner, store, config.server.max_page_size))
    }
}
