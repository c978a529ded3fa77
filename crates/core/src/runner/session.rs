//! In-memory state of one executing command.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ck_protocol::{Command, CommandStatus};
use tokio_util::sync::CancellationToken;

pub(crate) struct Session {
    id: String,
    log_topic: String,
    command: Mutex<Command>,
    /// Held from a status change until its event is published, so events
    /// leave in transition order and a stop never overtakes `RUNNING`.
    pub(crate) finalize: tokio::sync::Mutex<()>,
    pub(crate) stop: CancellationToken,
    pub(crate) done: CancellationToken,
}

impl Session {
    pub(crate) fn new(command: Command, log_topic: String) -> Arc<Self> {
        Arc::new(Self {
            id: command.id.clone(),
            log_topic,
            command: Mutex::new(command),
            finalize: tokio::sync::Mutex::new(()),
            stop: CancellationToken::new(),
            done: CancellationToken::new(),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn log_topic(&self) -> &str {
        &self.log_topic
    }

    pub(crate) fn status(&self) -> CommandStatus {
        self.lock().status
    }

    pub(crate) fn snapshot(&self) -> Command {
        self.lock().clone()
    }

    /// Compare-and-set on the status.
    ///
    /// Moves to `to` only if the state machine allows it from the current
    /// status and returns the updated command. Returns `None` otherwise,
    /// which is always the case once a terminal status has been reached.
    pub(crate) fn try_transition(&self, to: CommandStatus) -> Option<Command> {
        let mut command = self.lock();
        if !command.status.can_transition_to(to) {
            return None;
        }
        command.status = to;
        Some(command.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Command> {
        self.command.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
