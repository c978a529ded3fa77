//! Drain tasks: one per output stream of a child process.

use std::sync::Arc;

use ck_protocol::{LogRecord, LogSource};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use super::latch::LatchGuard;
use crate::bus::Topic;
use crate::ids::{now_timestamp, IdGenerator};

/// Longest line published as one record. Longer lines are split into
/// chunks of this size.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

/// Read `reader` line by line and publish each line as a [`LogRecord`].
///
/// Stops at end-of-stream, on a read error, or when the topic has been
/// closed. `done` counts the drain latch down when this returns or unwinds.
pub(crate) async fn drain<R>(
    reader: R,
    source: LogSource,
    command_id: String,
    topic: Arc<Topic<LogRecord>>,
    ids: Arc<IdGenerator>,
    done: LatchGuard,
) -> usize
where
    R: AsyncRead + Unpin,
{
    let _done = done;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut published = 0;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
        match limited.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                warn!(command_id = %command_id, source = source.as_str(), %error, "read failed");
                break;
            }
        }

        let record = LogRecord {
            id: ids.next_id(),
            command_id: command_id.clone(),
            created_at: now_timestamp(),
            content: line_content(&buf),
            source,
        };
        if let Err(error) = topic.publish(record).await {
            debug!(command_id = %command_id, %error, "log topic gone, stopping drain");
            break;
        }
        published += 1;
    }

    debug!(command_id = %command_id, source = source.as_str(), published, "drain finished");
    published
}

fn line_content(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
