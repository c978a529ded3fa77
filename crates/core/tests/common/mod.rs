//! Common test utilities for runner integration tests.
//!
//! This module provides:
//! - A wired-up runner over an in-memory store
//! - Helpers to collect topic output with a deadline
//! - Status sequence assertions

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
pub use fixtures::*;
