//! Infrastructure layer for partyline.
//!
//! Contains the adapters behind the ports defined in `partyline-core`: the
//! SQLite persistence store, the WebSocket transport, and the config loader.

pub mod config;
pub mod sqlite;
pub mod transport;
