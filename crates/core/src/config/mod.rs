//! Configuration loading and management.
//!
//! This module loads `cockpit.toml`, the single configuration file of a
//! cockpit deployment. Every setting has a default, so a missing file is
//! not an error.

pub mod error;
pub mod loader;
pub mod models;
