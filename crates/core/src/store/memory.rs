//! In-memory store.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ck_protocol::{Command, CommandStatus, LogRecord};

use super::{check_transition, Store, StoreError, StoreResult};
use crate::ids::{cursor_or_max, now_timestamp, IdGenerator};

#[derive(Default)]
struct Tables {
    commands: BTreeMap<String, Command>,
    logs: HashMap<String, BTreeMap<String, LogRecord>>,
}

/// Keeps history in ordered maps for the lifetime of the process.
pub struct MemoryStore {
    ids: Arc<IdGenerator>,
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            ids,
            tables: Mutex::new(Tables::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn page<V: Clone>(rows: &BTreeMap<String, V>, before: &str, limit: usize) -> Vec<V> {
    rows.range::<str, _>((Bound::Unbounded, Bound::Excluded(cursor_or_max(before))))
        .rev()
        .take(limit)
        .map(|(_, v)| v.clone())
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn new_command(&self, command_line: &str) -> StoreResult<Command> {
        let command = Command {
            id: self.ids.next_id(),
            created_at: now_timestamp(),
            command: command_line.to_string(),
            status: CommandStatus::Idle,
        };
        self.lock()
            .commands
            .insert(command.id.clone(), command.clone());
        Ok(command)
    }

    async fn get_command(&self, id: &str) -> StoreResult<Command> {
        self.lock()
            .commands
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_commands(&self, before: &str, limit: usize) -> StoreResult<Vec<Command>> {
        Ok(page(&self.lock().commands, before, limit))
    }

    async fn add_log(&self, record: &LogRecord) -> StoreResult<()> {
        let mut tables = self.lock();
        if !tables.commands.contains_key(&record.command_id) {
            return Err(StoreError::NotFound(record.command_id.clone()));
        }
        tables
            .logs
            .entry(record.command_id.clone())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_logs(
        &self,
        command_id: &str,
        before: &str,
        limit: usize,
    ) -> StoreResult<Vec<LogRecord>> {
        Ok(self
            .lock()
            .logs
            .get(command_id)
            .map(|rows| page(rows, before, limit))
            .unwrap_or_default())
    }

    async fn update_status(&self, id: &str, status: CommandStatus) -> StoreResult<()> {
        let mut tables = self.lock();
        let command = tables
            .commands
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        check_transition(id, command.status, status)?;
        command.status = status;
        Ok(())
    }
}
