//! Transport adapters.

pub mod ws;

pub use ws::{WsConnection, WsTransport};
