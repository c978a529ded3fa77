//! # ck-core
//!
//! Process runner and publish/subscribe fabric for cockpit.
//!
//! This crate provides:
//! - An in-process event bus of typed, named topics with blocking fan-out
//! - A runner that executes command lines and streams their output
//! - Durable command and log history behind a `Store` trait
//! - Configuration loading from `cockpit.toml`
//!
//! ## Modules
//!
//! - [`bus`]: Topics and the topic registry
//! - [`runner`]: Command lifecycle, drains and stop handling
//! - [`persist`]: Log topic to store forwarding
//! - [`store`]: SQLite and in-memory history
//! - [`ids`]: Sortable identifiers and timestamps
//! - [`config`]: Configuration loading and management

pub mod bus;
pub mod config;
pub mod ids;
pub mod persist;
pub mod runner;
pub mod store;
