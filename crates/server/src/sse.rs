//! Stream forwarder: relays one topic subscription to an HTTP client as
//! server-sent events.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use ck_core::bus::Unsubscribe;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Turn a subscription into an SSE response.
///
/// Each received value becomes one `data:` frame holding its JSON encoding.
/// The stream ends when the topic closes. When the client disconnects the
/// stream is dropped together with the receiver and `unsubscribe`, which
/// detaches it from the topic without waiting on the publisher.
pub fn forward<T>(
    mut rx: mpsc::Receiver<T>,
    unsubscribe: Unsubscribe,
    label: String,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    debug!(stream = %label, "client attached");
    let stream = async_stream::stream! {
        let _unsubscribe = unsubscribe;
        while let Some(value) = rx.recv().await {
            match serde_json::to_string(&value) {
                Ok(data) => yield Ok::<_, Infallible>(Event::default().data(data)),
                Err(error) => warn!(stream = %label, %error, "failed to encode event"),
            }
        }
        debug!(stream = %label, "topic closed, ending stream");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
