//! SQLite-backed store.
//!
//! One connection guarded by a mutex; every query runs on tokio's blocking
//! pool so the async callers never stall a runtime worker on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use ck_protocol::{Command, CommandStatus, LogRecord, LogSource};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{check_transition, Store, StoreError, StoreResult};
use crate::ids::{cursor_or_max, now_timestamp, IdGenerator};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS command (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    command TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS log (
    id TEXT PRIMARY KEY,
    command_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    content TEXT NOT NULL,
    fd INTEGER NOT NULL,
    FOREIGN KEY (command_id) REFERENCES command (id)
);
CREATE INDEX IF NOT EXISTS log_command_id_id ON log (command_id, id);
";

const INSERT_COMMAND: &str =
    "INSERT INTO command (id, created_at, command, status) VALUES (?1, ?2, ?3, ?4)";
const SELECT_COMMAND: &str = "SELECT id, created_at, command, status FROM command WHERE id = ?1";
const LIST_COMMANDS: &str = "SELECT id, created_at, command, status FROM command
     WHERE id < ?1 ORDER BY id DESC LIMIT ?2";
const SELECT_STATUS: &str = "SELECT status FROM command WHERE id = ?1";
const UPDATE_STATUS: &str = "UPDATE command SET status = ?1 WHERE id = ?2";
const INSERT_LOG: &str =
    "INSERT INTO log (id, command_id, created_at, content, fd) VALUES (?1, ?2, ?3, ?4, ?5)";
const SELECT_LOGS: &str = "SELECT id, command_id, created_at, content, fd FROM log
     WHERE command_id = ?1 AND id < ?2 ORDER BY id DESC LIMIT ?3";

pub struct SqliteStore {
    ids: Arc<IdGenerator>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file at `path`, enable WAL mode and
    /// create the schema.
    pub fn open(path: impl AsRef<Path>, ids: Arc<IdGenerator>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        Self::init(conn, ids)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(ids: Arc<IdGenerator>) -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, ids)
    }

    fn init(conn: Connection, ids: Arc<IdGenerator>) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            ids,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Connection) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

fn conversion_error(
    column: usize,
    reason: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(reason))
}

fn command_from_row(row: &Row<'_>) -> rusqlite::Result<Command> {
    let status: String = row.get(3)?;
    Ok(Command {
        id: row.get(0)?,
        created_at: row.get(1)?,
        command: row.get(2)?,
        status: status.parse().map_err(|e| conversion_error(3, e))?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    let fd: i64 = row.get(4)?;
    let source = LogSource::from_fd(fd).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Integer,
            format!("unknown fd {fd}").into(),
        )
    })?;
    Ok(LogRecord {
        id: row.get(0)?,
        command_id: row.get(1)?,
        created_at: row.get(2)?,
        content: row.get(3)?,
        source,
    })
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl Store for SqliteStore {
    async fn new_command(&self, command_line: &str) -> StoreResult<Command> {
        let command = Command {
            id: self.ids.next_id(),
            created_at: now_timestamp(),
            command: command_line.to_string(),
            status: CommandStatus::Idle,
        };
        let row = command.clone();
        self.with_conn(move |conn| {
            conn.execute(
                INSERT_COMMAND,
                params![row.id, row.created_at, row.command, row.status.as_str()],
            )?;
            Ok(())
        })
        .await?;
        Ok(command)
    }

    async fn get_command(&self, id: &str) -> StoreResult<Command> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let command = conn
                .query_row(SELECT_COMMAND, params![id], command_from_row)
                .optional()?;
            command.ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn list_commands(&self, before: &str, limit: usize) -> StoreResult<Vec<Command>> {
        let before = cursor_or_max(before).to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(LIST_COMMANDS)?;
            let rows = stmt
                .query_map(params![before, sql_limit(limit)], command_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn add_log(&self, record: &LogRecord) -> StoreResult<()> {
        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                INSERT_LOG,
                params![
                    row.id,
                    row.command_id,
                    row.created_at,
                    row.content,
                    row.source.fd()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_logs(
        &self,
        command_id: &str,
        before: &str,
        limit: usize,
    ) -> StoreResult<Vec<LogRecord>> {
        let command_id = command_id.to_string();
        let before = cursor_or_max(before).to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(SELECT_LOGS)?;
            let rows = stmt
                .query_map(params![command_id, before, sql_limit(limit)], log_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn update_status(&self, id: &str, status: CommandStatus) -> StoreResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let current: Option<String> = conn
                .query_row(SELECT_STATUS, params![id], |row| row.get(0))
                .optional()?;
            let current = current.ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let current: CommandStatus =
                current.parse().map_err(|e: ck_protocol::UnknownStatus| {
                    StoreError::Corrupt {
                        table: "command",
                        reason: e.to_string(),
                    }
                })?;

            check_transition(&id, current, status)?;
            conn.execute(UPDATE_STATUS, params![status.as_str(), id])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(Arc::new(IdGenerator::new())).unwrap()
    }

    fn record(ids: &IdGenerator, command_id: &str, content: &str, source: LogSource) -> LogRecord {
        LogRecord {
            id: ids.next_id(),
            command_id: command_id.to_string(),
            created_at: now_timestamp(),
            content: content.to_string(),
            source,
        }
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let store = store();
        let command = store.new_command("ls -alh").await.unwrap();

        let listed = store.list_commands("", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], command);
        assert_eq!(store.get_command(&command.id).await.unwrap(), command);
    }

    #[tokio::test]
    async fn test_get_missing_command_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get_command("missing").await,
            Err(StoreError::NotFound(id)) if id == "missing"
        ));
        assert!(matches!(
            store.update_status("missing", CommandStatus::Running).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_commands_cursor_pagination() {
        let store = store();
        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(store.new_command(&format!("echo {n}")).await.unwrap().id);
        }

        let first = store.list_commands("", 2).await.unwrap();
        let second = store.list_commands(&first[1].id, 2).await.unwrap();
        let third = store.list_commands(&second[1].id, 2).await.unwrap();
        let rest = store.list_commands(&third[0].id, 2).await.unwrap();

        let paged: Vec<_> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|c| c.id.clone())
            .collect();
        ids.reverse();
        assert_eq!(paged, ids);
        assert_eq!(third.len(), 1);
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_logs_round_trip_with_sources() {
        let store = store();
        let ids = IdGenerator::new();
        let command = store.new_command("echo hi").await.unwrap();

        let out = record(&ids, &command.id, "hi", LogSource::Stdout);
        let err = record(&ids, &command.id, "oops", LogSource::Stderr);
        let internal = record(&ids, &command.id, "failed", LogSource::InternalError);
        for r in [&out, &err, &internal] {
            store.add_log(r).await.unwrap();
        }

        let logs = store.get_logs(&command.id, "", 10).await.unwrap();
        assert_eq!(logs, vec![internal, err.clone(), out.clone()]);

        let older = store.get_logs(&command.id, &err.id, 10).await.unwrap();
        assert_eq!(older, vec![out]);
    }

    #[tokio::test]
    async fn test_log_for_unknown_command_is_rejected() {
        let store = store();
        let ids = IdGenerator::new();
        let orphan = record(&ids, "nope", "lost", LogSource::Stdout);

        assert!(matches!(
            store.add_log(&orphan).await,
            Err(StoreError::Sqlite(_))
        ));
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = store();
        let id = store.new_command("false").await.unwrap().id;

        store.update_status(&id, CommandStatus::Running).await.unwrap();
        store.update_status(&id, CommandStatus::Error).await.unwrap();
        assert!(matches!(
            store.update_status(&id, CommandStatus::Exited).await,
            Err(StoreError::InvalidTransition { .. })
        ));
        assert_eq!(
            store.get_command(&id).await.unwrap().status,
            CommandStatus::Error
        );
    }

    #[tokio::test]
    async fn test_reopening_file_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cockpit.db");
        let ids = Arc::new(IdGenerator::new());

        let id = {
            let store = SqliteStore::open(&path, Arc::clone(&ids)).unwrap();
            store.new_command("uptime").await.unwrap().id
        };

        let reopened = SqliteStore::open(&path, ids).unwrap();
        assert_eq!(reopened.get_command(&id).await.unwrap().command, "uptime");
    }
}
