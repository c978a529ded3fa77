//! Persistence consumer: copies every record of a log topic into the store.

use std::sync::Arc;

use ck_protocol::LogRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::{BusResult, Topic, Unsubscribe};
use crate::store::Store;

/// Subscribe to `topic` now and spawn the forwarding task.
///
/// Subscribing happens before this returns, so every record published
/// afterwards reaches the store. The task ends when the topic is closed and
/// resolves to the number of records stored.
///
/// # Errors
///
/// Returns [`crate::bus::BusError::Closed`] if the topic is already closed.
pub fn spawn_persistence(
    store: Arc<dyn Store>,
    topic: &Arc<Topic<LogRecord>>,
) -> BusResult<JoinHandle<usize>> {
    let (rx, unsubscribe) = topic.subscribe()?;
    Ok(tokio::spawn(forward_logs(store, rx, unsubscribe)))
}

/// Store each received record once. A failed write is logged and skipped.
pub async fn forward_logs(
    store: Arc<dyn Store>,
    mut records: mpsc::Receiver<LogRecord>,
    unsubscribe: Unsubscribe,
) -> usize {
    let _unsubscribe = unsubscribe;
    let mut stored = 0;
    let mut command_id = None;

    while let Some(record) = records.recv().await {
        match store.add_log(&record).await {
            Ok(()) => stored += 1,
            Err(error) => {
                warn!(command_id = %record.command_id, log_id = %record.id, %error, "failed to persist log record")
            }
        }
        command_id.get_or_insert(record.command_id);
    }

    debug!(command_id = command_id.as_deref().unwrap_or("-"), stored, "persistence finished");
    stored
}
