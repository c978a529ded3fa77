//! Command execution.
//!
//! The [`Runner`] owns every live [`session::Session`]. For each command it
//! creates a log topic on the [`EventBus`], spawns the process and starts
//! these tasks:
//! - two drain tasks, one per output stream, publishing [`LogRecord`]s
//! - a persistence task copying the log topic into the [`Store`]
//! - a wait task that joins both drains, reaps the process, records the
//!   terminal status and closes the log topic
//!
//! Every status change is written to the store and published as a
//! [`CommandEvent`] on the shared [`STATUS_TOPIC`].
//!
//! # Lifecycle
//!
//! ```text
//!   IDLE ──spawn ok──► RUNNING ──exit 0──► EXITED
//!     │                   │
//!     │                   └──exit != 0 / wait error / stop──► ERROR
//!     └──spawn failed / stop──────────────────────────────► ERROR
//! ```

mod drain;
mod error;
mod latch;
mod launch;
mod session;

pub use error::{LaunchError, RunnerError, RunnerResult};
pub use latch::{CountdownLatch, LatchGuard};
pub use launch::Launcher;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ck_protocol::{Command, CommandEvent, CommandStatus, LogRecord, LogSource};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, Unsubscribe};
use crate::ids::{now_timestamp, IdGenerator};
use crate::persist::spawn_persistence;
use crate::store::Store;
use session::Session;

/// Name of the topic carrying every command's status changes.
pub const STATUS_TOPIC: &str = "command";

/// Synthetic log line recorded when a command is stopped on request.
pub const STOPPED_BY_REQUEST: &str = "command stopped by request";

/// Name of the log topic of command `id`.
pub fn log_topic_name(id: &str) -> String {
    format!("log:{id}")
}

/// Runs commands and tracks the live ones.
///
/// Cheap to clone; clones share the same session registry.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

struct Inner {
    bus: Arc<EventBus>,
    store: Arc<dyn Store>,
    ids: Arc<IdGenerator>,
    launcher: Launcher,
    status_topic: Arc<Topic<CommandEvent>>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Runner {
    /// Create a runner and register [`STATUS_TOPIC`] on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Bus`] if the status topic already exists.
    pub fn new(
        bus: Arc<EventBus>,
        store: Arc<dyn Store>,
        ids: Arc<IdGenerator>,
        launcher: Launcher,
    ) -> RunnerResult<Self> {
        let status_topic = bus.create_topic::<CommandEvent>(STATUS_TOPIC)?;
        Ok(Self {
            inner: Arc::new(Inner {
                bus,
                store,
                ids,
                launcher,
                status_topic,
                sessions: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// Record `command_line` as a new command and start it.
    ///
    /// Publishes a `create` event, then behaves like [`Runner::run`].
    /// Returns the command as recorded, with `IDLE` status.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Store`] if the command cannot be recorded.
    /// A command that fails to start is not an error here; it ends in
    /// `ERROR` status instead.
    pub async fn submit(&self, command_line: &str) -> RunnerResult<Command> {
        let command = self.inner.store.new_command(command_line).await?;
        info!(command_id = %command.id, command = %command.command, "command submitted");
        self.publish_status(CommandEvent::created(command.clone()))
            .await;
        self.run(command.clone()).await?;
        Ok(command)
    }

    /// Start executing a recorded `IDLE` command.
    ///
    /// Returns once the process has been spawned (or failed to spawn);
    /// execution continues in background tasks.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::AlreadyRunning`] if a live session has this id
    /// - [`RunnerError::NotIdle`] if the command has already run
    /// - [`RunnerError::Bus`] if the log topic name is taken
    pub async fn run(&self, command: Command) -> RunnerResult<()> {
        if command.status != CommandStatus::Idle {
            return Err(RunnerError::NotIdle {
                id: command.id,
                status: command.status,
            });
        }

        let topic_name = log_topic_name(&command.id);
        let session = Session::new(command, topic_name);
        self.register(&session)?;

        let topic = match self
            .inner
            .bus
            .create_topic::<LogRecord>(session.log_topic())
        {
            Ok(topic) => topic,
            Err(error) => {
                self.deregister(session.id());
                return Err(error.into());
            }
        };
        let persistence = match spawn_persistence(Arc::clone(&self.inner.store), &topic) {
            Ok(handle) => handle,
            Err(error) => {
                self.deregister(session.id());
                return Err(error.into());
            }
        };

        let command_line = session.snapshot().command;
        match self.inner.launcher.spawn(&command_line) {
            Ok(child) => {
                debug!(command_id = %session.id(), pid = ?child.id(), "process started");
                {
                    let _finalize = session.finalize.lock().await;
                    if let Some(running) = session.try_transition(CommandStatus::Running) {
                        self.record_status(running).await;
                    }
                }
                self.supervise(session, topic, persistence, child);
            }
            Err(error) => {
                warn!(command_id = %session.id(), %error, "command failed to start");
                self.finish(
                    &session,
                    &topic,
                    CommandStatus::Error,
                    Some(error.to_string()),
                )
                .await;
                self.teardown(&session, persistence).await;
            }
        }
        Ok(())
    }

    /// Request early termination of a live command.
    ///
    /// Returns `true` if this call moved the command to `ERROR`, `false` if
    /// it had already reached a terminal status on its own. The process is
    /// killed either way.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::SessionNotFound`] if no live session has this
    /// id.
    pub async fn stop(&self, id: &str) -> RunnerResult<bool> {
        let session = self
            .session(id)
            .ok_or_else(|| RunnerError::SessionNotFound(id.to_string()))?;

        let stopped = match self.inner.bus.topic::<LogRecord>(session.log_topic()) {
            Ok(topic) => {
                self.finish(
                    &session,
                    &topic,
                    CommandStatus::Error,
                    Some(STOPPED_BY_REQUEST.to_string()),
                )
                .await
            }
            Err(_) => false,
        };
        session.stop.cancel();
        info!(command_id = %id, stopped, "stop requested");
        Ok(stopped)
    }

    /// Wait until command `id` has fully finalized, including flushing its
    /// log records to the store. Returns immediately for unknown or already
    /// finished ids.
    pub async fn wait(&self, id: &str) {
        if let Some(session) = self.session(id) {
            session.done.cancelled().await;
        }
    }

    /// Stop every live command, wait for all of them to finalize, then
    /// close [`STATUS_TOPIC`] so status subscribers reach end-of-stream.
    pub async fn shutdown(&self) {
        let ids = self.live_ids();
        for id in &ids {
            if let Err(error) = self.stop(id).await {
                debug!(command_id = %id, %error, "already finished during shutdown");
            }
        }
        for id in &ids {
            self.wait(id).await;
        }
        if let Err(error) = self.inner.bus.close_topic::<CommandEvent>(STATUS_TOPIC) {
            debug!(%error, "status topic already closed");
        }
        info!(stopped = ids.len(), "runner shut down");
    }

    /// Status of a live command, `None` once it has finalized.
    pub fn status(&self, id: &str) -> Option<CommandStatus> {
        self.session(id).map(|s| s.status())
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.read_sessions().contains_key(id)
    }

    pub fn live_ids(&self) -> Vec<String> {
        self.read_sessions().keys().cloned().collect()
    }

    /// Subscribe to the status changes of every command.
    pub fn subscribe_status(&self) -> RunnerResult<(mpsc::Receiver<CommandEvent>, Unsubscribe)> {
        Ok(self.inner.status_topic.subscribe()?)
    }

    /// Subscribe to the live log of command `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Bus`] with `NotFound` once the command has
    /// finished and its topic was closed.
    pub fn subscribe_logs(
        &self,
        id: &str,
    ) -> RunnerResult<(mpsc::Receiver<LogRecord>, Unsubscribe)> {
        Ok(self.inner.bus.subscribe::<LogRecord>(&log_topic_name(id))?)
    }

    fn supervise(
        &self,
        session: Arc<Session>,
        topic: Arc<Topic<LogRecord>>,
        persistence: JoinHandle<usize>,
        mut child: Child,
    ) {
        let drains = CountdownLatch::new(2);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain::drain(
                stdout,
                LogSource::Stdout,
                session.id().to_string(),
                Arc::clone(&topic),
                Arc::clone(&self.inner.ids),
                drains.guard(),
            ));
        } else {
            drains.count_down();
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain::drain(
                stderr,
                LogSource::Stderr,
                session.id().to_string(),
                Arc::clone(&topic),
                Arc::clone(&self.inner.ids),
                drains.guard(),
            ));
        } else {
            drains.count_down();
        }

        let runner = self.clone();
        tokio::spawn(async move {
            let (status, note) = wait_for_exit(&session, &drains, child).await;
            runner.finish(&session, &topic, status, note).await;
            runner.teardown(&session, persistence).await;
        });
    }

    /// Perform a terminal transition unless one already happened.
    ///
    /// Under the session's finalize lock: compare-and-set the status,
    /// publish the synthetic record if any, then record the status. Returns
    /// whether this call made the transition.
    async fn finish(
        &self,
        session: &Session,
        topic: &Topic<LogRecord>,
        status: CommandStatus,
        note: Option<String>,
    ) -> bool {
        let _finalize = session.finalize.lock().await;
        let Some(command) = session.try_transition(status) else {
            return false;
        };

        if let Some(content) = note {
            let record = LogRecord {
                id: self.inner.ids.next_id(),
                command_id: command.id.clone(),
                created_at: now_timestamp(),
                content,
                source: LogSource::InternalError,
            };
            if let Err(error) = topic.publish(record).await {
                warn!(command_id = %command.id, %error, "failed to publish internal error record");
            }
        }
        info!(command_id = %command.id, status = %command.status, "command finished");
        self.record_status(command).await;
        true
    }

    /// Close the log topic, flush persistence and drop the session.
    async fn teardown(&self, session: &Session, persistence: JoinHandle<usize>) {
        if let Err(error) = self
            .inner
            .bus
            .close_topic::<LogRecord>(session.log_topic())
        {
            warn!(command_id = %session.id(), %error, "failed to close log topic");
        }
        if let Err(error) = persistence.await {
            warn!(command_id = %session.id(), %error, "persistence task failed");
        }
        self.deregister(session.id());
        session.done.cancel();
    }

    async fn record_status(&self, command: Command) {
        if let Err(error) = self
            .inner
            .store
            .update_status(&command.id, command.status)
            .await
        {
            warn!(command_id = %command.id, %error, "failed to persist status");
        }
        self.publish_status(CommandEvent::updated(command)).await;
    }

    async fn publish_status(&self, event: CommandEvent) {
        if let Err(error) = self.inner.status_topic.publish(event).await {
            warn!(%error, "failed to publish status event");
        }
    }

    fn register(&self, session: &Arc<Session>) -> RunnerResult<()> {
        let mut sessions = self.write_sessions();
        if sessions.contains_key(session.id()) {
            return Err(RunnerError::AlreadyRunning(session.id().to_string()));
        }
        sessions.insert(session.id().to_string(), Arc::clone(session));
        Ok(())
    }

    fn deregister(&self, id: &str) {
        self.write_sessions().remove(id);
    }

    fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.read_sessions().get(id).cloned()
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Join both drains, then reap the child. A stop request kills the child
/// at whichever point it arrives.
async fn wait_for_exit(
    session: &Session,
    drains: &CountdownLatch,
    mut child: Child,
) -> (CommandStatus, Option<String>) {
    let mut killed = false;

    tokio::select! {
        _ = drains.wait() => {}
        _ = session.stop.cancelled() => {
            kill(session, &mut child);
            killed = true;
            drains.wait().await;
        }
    }

    let exit = tokio::select! {
        exit = child.wait() => exit,
        _ = session.stop.cancelled(), if !killed => {
            kill(session, &mut child);
            child.wait().await
        }
    };

    match exit {
        Ok(status) if status.success() => (CommandStatus::Exited, None),
        Ok(status) => (
            CommandStatus::Error,
            Some(format!("command exited with {status}")),
        ),
        Err(error) => (
            CommandStatus::Error,
            Some(format!("failed to wait for command: {error}")),
        ),
    }
}

fn kill(session: &Session, child: &mut Child) {
    if let Err(error) = launch::kill_group(child) {
        debug!(command_id = %session.id(), %error, "kill failed, process already gone");
    }
}
