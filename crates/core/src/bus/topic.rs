//! A single named multicast channel.
//!
//! Every subscriber gets its own bounded `mpsc` channel. Publishing awaits
//! room in each subscriber's channel in turn, so a stalled subscriber
//! stalls the publisher instead of losing values. The membership lock only
//! guards the subscriber list and is released before any value is sent.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

use super::error::{BusError, BusResult};

/// A multicast channel carrying values of type `T`.
pub struct Topic<T> {
    name: String,
    capacity: usize,
    next_id: AtomicU64,
    state: Mutex<TopicState<T>>,
}

struct TopicState<T> {
    closed: bool,
    subscribers: Vec<Subscriber<T>>,
}

struct Subscriber<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Topic<T>
where
    T: Clone + Send + 'static,
{
    /// Create an open topic whose subscribers buffer up to `capacity`
    /// values each (at least one).
    pub fn new(name: impl Into<String>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(0),
            state: Mutex::new(TopicState {
                closed: false,
                subscribers: Vec::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new receiver.
    ///
    /// The returned [`Unsubscribe`] guard removes the receiver from future
    /// deliveries when called or dropped. Values already handed to the
    /// receiver stay readable.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] once the topic has been closed.
    pub fn subscribe(self: &Arc<Self>) -> BusResult<(mpsc::Receiver<T>, Unsubscribe)> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.lock();
            if state.closed {
                return Err(BusError::Closed(self.name.clone()));
            }
            state.subscribers.push(Subscriber { id, tx });
        }
        trace!(topic = %self.name, subscriber = id, "subscribed");

        let topic = Arc::downgrade(self);
        let unsubscribe = Unsubscribe::new(move || {
            if let Some(topic) = topic.upgrade() {
                topic.remove(id);
            }
        });
        Ok((rx, unsubscribe))
    }

    /// Deliver `value` to every receiver registered when the call starts,
    /// in subscription order.
    ///
    /// Waits for each receiver to have room. Receivers that were dropped
    /// are pruned from the topic.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] once the topic has been closed.
    pub async fn publish(&self, value: T) -> BusResult<()> {
        let targets = {
            let state = self.lock();
            if state.closed {
                return Err(BusError::Closed(self.name.clone()));
            }
            state.subscribers.clone()
        };

        let mut departed = Vec::new();
        for subscriber in &targets {
            if subscriber.tx.send(value.clone()).await.is_err() {
                departed.push(subscriber.id);
            }
        }

        if !departed.is_empty() {
            trace!(topic = %self.name, count = departed.len(), "pruning dropped receivers");
            self.lock()
                .subscribers
                .retain(|s| !departed.contains(&s.id));
        }
        Ok(())
    }

    /// Close the topic.
    ///
    /// Every receiver observes end-of-stream after draining what it already
    /// holds. Later `subscribe` and `publish` calls fail. Closing twice is a
    /// no-op.
    pub fn close(&self) {
        let subscribers = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.subscribers)
        };
        trace!(topic = %self.name, count = subscribers.len(), "closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn remove(&self, id: u64) {
        self.lock().subscribers.retain(|s| s.id != id);
        trace!(topic = %self.name, subscriber = id, "unsubscribed");
    }

    fn lock(&self) -> MutexGuard<'_, TopicState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Removes a receiver from its topic when called or dropped.
///
/// Never blocks: it only edits the membership list. A publish already in
/// flight to the receiver is unaffected; drop the receiver as well to make
/// that delivery fail fast.
#[must_use = "dropping an Unsubscribe removes the subscriber immediately"]
pub struct Unsubscribe {
    remove: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Unsubscribe {
    fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
