//! In-process publish/subscribe fabric.
//!
//! The bus provides:
//! - [`Topic`]: one named multicast channel for a single value type
//! - [`EventBus`]: registry of topics by name with type-checked access
//!
//! # Architecture
//!
//! ```text
//!   drain (stdout) ──┐                      ┌──► persistence consumer ──► Store
//!                    ├──► Topic<LogRecord> ──┼──► SSE forwarder (client 1)
//!   drain (stderr) ──┘     (per command)     └──► SSE forwarder (client N)
//!
//!   runner ──► Topic<CommandEvent> ("command") ──► SSE forwarders
//! ```
//!
//! Delivery is blocking: a full subscriber buffer stalls the publisher
//! until it drains. Nothing is dropped.

mod error;
mod event_bus;
mod topic;

pub use error::{BusError, BusResult};
pub use event_bus::{EventBus, DEFAULT_SUBSCRIBER_CAPACITY};
pub use topic::{Topic, Unsubscribe};
