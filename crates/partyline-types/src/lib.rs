//! Shared domain types for partyline.
//!
//! Chat messages, session and roster snapshots, wire frames, client
//! configuration, and the error taxonomy used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;
