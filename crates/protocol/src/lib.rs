//! # ck-protocol
//!
//! Core protocol definitions and data models for cockpit.
//!
//! This crate defines all shared data structures used for:
//! - Submitted commands and their lifecycle status
//! - Captured output lines of a running command
//! - Status-change events fanned out to live observers
//! - Request/response payloads of the HTTP API
//!
//! ## Modules
//!
//! - [`command_models`]: Commands and the status state machine
//! - [`log_models`]: Log records and their output source
//! - [`events`]: Status-change events for live streams
//! - [`api_models`]: HTTP request and response bodies
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde and ts-rs
//! - TypeScript generation: All wire types derive `TS` for the web client
//! - Independent compilation: No dependencies on other cockpit crates

pub mod api_models;
pub mod command_models;
pub mod events;
pub mod log_models;

// Re-export all public types for convenience
pub use api_models::*;
pub use command_models::*;
pub use events::*;
pub use log_models::*;
