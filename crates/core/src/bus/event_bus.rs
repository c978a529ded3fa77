//! Named registry of typed topics.
//!
//! Topics of different value types live side by side in one registry. Each
//! entry keeps the `TypeId` it was created with, and every by-name
//! operation compares it against the requested type before downcasting.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::debug;

use super::error::{BusError, BusResult};
use super::topic::{Topic, Unsubscribe};

/// Default per-subscriber buffer size.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

struct TopicEntry {
    type_id: TypeId,
    type_name: &'static str,
    topic: Arc<dyn Any + Send + Sync>,
}

/// Process-wide topic registry.
///
/// Construct one at startup and share it (`Arc<EventBus>`) with every
/// component that publishes or subscribes.
pub struct EventBus {
    subscriber_capacity: usize,
    topics: RwLock<HashMap<String, TopicEntry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Create a bus whose topics buffer `subscriber_capacity` values per
    /// subscriber.
    pub fn with_capacity(subscriber_capacity: usize) -> Self {
        Self {
            subscriber_capacity: subscriber_capacity.max(1),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new topic carrying `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::AlreadyExists`] if the name is taken, whatever
    /// its type. Of two racing calls for the same name exactly one wins.
    pub fn create_topic<T>(&self, name: &str) -> BusResult<Arc<Topic<T>>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut topics = self.write();
        if topics.contains_key(name) {
            return Err(BusError::AlreadyExists(name.to_string()));
        }

        let topic = Topic::<T>::new(name, self.subscriber_capacity);
        topics.insert(
            name.to_string(),
            TopicEntry {
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                topic: topic.clone(),
            },
        );
        debug!(topic = name, value_type = type_name::<T>(), "topic created");
        Ok(topic)
    }

    /// Look up a typed handle to a registered topic.
    ///
    /// The handle can be kept and used directly, skipping the by-name
    /// lookup and type check on every call.
    pub fn topic<T>(&self, name: &str) -> BusResult<Arc<Topic<T>>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let topics = self.read();
        let entry = topics
            .get(name)
            .ok_or_else(|| BusError::NotFound(name.to_string()))?;

        if entry.type_id != TypeId::of::<T>() {
            return Err(BusError::TypeMismatch {
                topic: name.to_string(),
                requested: type_name::<T>(),
                actual: entry.type_name,
            });
        }

        Arc::clone(&entry.topic)
            .downcast::<Topic<T>>()
            .map_err(|_| BusError::TypeMismatch {
                topic: name.to_string(),
                requested: type_name::<T>(),
                actual: entry.type_name,
            })
    }

    /// Publish `value` on the topic called `name`.
    ///
    /// The registry lock is released before delivery starts, so a stalled
    /// subscriber never blocks lookups or other topics.
    pub async fn publish<T>(&self, name: &str, value: T) -> BusResult<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let topic = self.topic::<T>(name)?;
        topic.publish(value).await
    }

    /// Subscribe to the topic called `name`.
    pub fn subscribe<T>(&self, name: &str) -> BusResult<(mpsc::Receiver<T>, Unsubscribe)>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.topic::<T>(name)?.subscribe()
    }

    /// Close the topic called `name` and remove it from the registry.
    ///
    /// Subscribers observe end-of-stream; later lookups by this name fail
    /// with [`BusError::NotFound`].
    pub fn close_topic<T>(&self, name: &str) -> BusResult<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let topic = {
            let mut topics = self.write();
            let entry = topics
                .get(name)
                .ok_or_else(|| BusError::NotFound(name.to_string()))?;
            if entry.type_id != TypeId::of::<T>() {
                return Err(BusError::TypeMismatch {
                    topic: name.to_string(),
                    requested: type_name::<T>(),
                    actual: entry.type_name,
                });
            }
            topics.remove(name).map(|entry| entry.topic)
        };

        if let Some(topic) = topic.and_then(|t| t.downcast::<Topic<T>>().ok()) {
            topic.close();
        }
        debug!(topic = name, "topic closed");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn topic_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TopicEntry>> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TopicEntry>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Tick(u32);

    #[test]
    fn test_create_topic_rejects_duplicate_names() {
        let bus = EventBus::new();
        bus.create_topic::<Tick>("ticks").unwrap();

        assert_eq!(
            bus.create_topic::<Tick>("ticks").unwrap_err(),
            BusError::AlreadyExists("ticks".to_string())
        );
        // The name is taken regardless of the value type.
        assert!(matches!(
            bus.create_topic::<String>("ticks"),
            Err(BusError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_topic_is_not_found() {
        let bus = EventBus::new();

        assert_eq!(
            bus.subscribe::<Tick>("missing").unwrap_err(),
            BusError::NotFound("missing".to_string())
        );
        assert_eq!(
            bus.close_topic::<Tick>("missing").unwrap_err(),
            BusError::NotFound("missing".to_string())
        );
    }

    #[tokio::test]
    async fn test_type_is_checked_per_topic() {
        let bus = EventBus::new();
        bus.create_topic::<Tick>("ticks").unwrap();
        bus.create_topic::<String>("lines").unwrap();

        let err = bus.publish("ticks", "not a tick".to_string()).await.unwrap_err();
        assert!(matches!(err, BusError::TypeMismatch { ref topic, .. } if topic == "ticks"));
        assert!(matches!(
            bus.subscribe::<String>("ticks"),
            Err(BusError::TypeMismatch { .. })
        ));
        assert!(matches!(
            bus.close_topic::<String>("ticks"),
            Err(BusError::TypeMismatch { .. })
        ));

        // Both topics stay usable with their own types.
        let (mut ticks, _unsub_ticks) = bus.subscribe::<Tick>("ticks").unwrap();
        let (mut lines, _unsub_lines) = bus.subscribe::<String>("lines").unwrap();
        bus.publish("ticks", Tick(1)).await.unwrap();
        bus.publish("lines", "hello".to_string()).await.unwrap();
        assert_eq!(ticks.recv().await, Some(Tick(1)));
        assert_eq!(lines.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_close_topic_ends_subscribers_and_deregisters() {
        let bus = EventBus::new();
        let handle = bus.create_topic::<Tick>("ticks").unwrap();
        let (mut rx, _unsub) = bus.subscribe::<Tick>("ticks").unwrap();

        bus.close_topic::<Tick>("ticks").unwrap();

        assert_eq!(rx.recv().await, None);
        assert!(!bus.contains("ticks"));
        assert_eq!(
            bus.subscribe::<Tick>("ticks").unwrap_err(),
            BusError::NotFound("ticks".to_string())
        );
        assert_eq!(
            bus.publish("ticks", Tick(2)).await.unwrap_err(),
            BusError::NotFound("ticks".to_string())
        );
        // A handle obtained earlier reports the closure instead.
        assert!(matches!(handle.publish(Tick(3)).await, Err(BusError::Closed(_))));

        // The name can be reused afterwards.
        bus.create_topic::<Tick>("ticks").unwrap();
    }

    #[test]
    fn test_concurrent_create_has_exactly_one_winner() {
        let bus = Arc::new(EventBus::new());

        for round in 0..50 {
            let name = format!("race-{round}");
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let bus = Arc::clone(&bus);
                    let name = name.clone();
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        bus.create_topic::<Tick>(&name).is_ok()
                    })
                })
                .collect();

            let wins = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(wins, 1, "round {round}");
        }
        assert_eq!(bus.topic_count(), 50);
    }

    #[tokio::test]
    async fn test_stalled_topic_does_not_block_registry() {
        let bus = Arc::new(EventBus::with_capacity(1));
        bus.create_topic::<Tick>("ticks").unwrap();
        let (_stalled, _unsub) = bus.subscribe::<Tick>("ticks").unwrap();
        bus.publish("ticks", Tick(1)).await.unwrap();

        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.publish("ticks", Tick(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!publisher.is_finished());

        // Registry operations proceed while the publisher is stuck.
        bus.create_topic::<Tick>("other").unwrap();
        let (mut other, _unsub_other) = bus.subscribe::<Tick>("other").unwrap();
        bus.publish("other", Tick(9)).await.unwrap();
        assert_eq!(other.recv().await, Some(Tick(9)));

        publisher.abort();
    }
}
