//! Test fixtures: a runner with its bus and store, and collectors.

use std::sync::Arc;
use std::time::Duration;

use ck_core::bus::{EventBus, Unsubscribe};
use ck_core::ids::IdGenerator;
use ck_core::runner::{Launcher, Runner};
use ck_core::store::{MemoryStore, Store};
use ck_protocol::{CommandEvent, CommandStatus, LogRecord};
use tokio::sync::mpsc;

/// Upper bound for any single test step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Harness {
    pub bus: Arc<EventBus>,
    pub store: Arc<MemoryStore>,
    pub runner: Runner,
    pub status: mpsc::Receiver<CommandEvent>,
    _status_subscription: Unsubscribe,
}

/// Runner with direct execution, subscribed to status events before any
/// command is submitted.
pub fn harness() -> Harness {
    harness_with(Launcher::Direct)
}

pub fn harness_with(launcher: Launcher) -> Harness {
    let ids = Arc::new(IdGenerator::new());
    let bus = Arc::new(EventBus::with_capacity(64));
    let store = Arc::new(MemoryStore::new(Arc::clone(&ids)));
    let runner = Runner::new(
        Arc::clone(&bus),
        store.clone() as Arc<dyn Store>,
        ids,
        launcher,
    )
    .unwrap();
    let (status, subscription) = runner.subscribe_status().unwrap();

    Harness {
        bus,
        store,
        runner,
        status,
        _status_subscription: subscription,
    }
}

impl Harness {
    /// Status values published for `id`, up to and including the terminal
    /// one. Events of other commands are skipped.
    pub async fn statuses_for(&mut self, id: &str) -> Vec<CommandStatus> {
        let mut statuses = Vec::new();
        loop {
            let event = tokio::time::timeout(STEP_TIMEOUT, self.status.recv())
                .await
                .expect("timed out waiting for status event")
                .expect("status topic closed");
            if event.command.id != id {
                continue;
            }
            statuses.push(event.status());
            if event.status().is_terminal() {
                return statuses;
            }
        }
    }

    /// Persisted log records of `id` in publish order.
    pub async fn persisted_logs(&self, id: &str) -> Vec<LogRecord> {
        let mut logs = self.store.get_logs(id, "", 1_000).await.unwrap();
        logs.reverse();
        logs
    }
}

/// Receive until the topic closes.
pub async fn collect_until_closed<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut values = Vec::new();
    loop {
        match tokio::time::timeout(STEP_TIMEOUT, rx.recv()).await {
            Ok(Some(value)) => values.push(value),
            Ok(None) => return values,
            Err(_) => panic!("timed out after {} values", values.len()),
        }
    }
}

/// Receive exactly `n` values.
pub async fn take<T>(rx: &mut mpsc::Receiver<T>, n: usize) -> Vec<T> {
    let mut values = Vec::with_capacity(n);
    while values.len() < n {
        let value = tokio::time::timeout(STEP_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for value")
            .expect("topic closed early");
        values.push(value);
    }
    values
}

pub fn contents(records: &[LogRecord]) -> Vec<&str> {
    records.iter().map(|r| r.content.as_str()).collect()
}
