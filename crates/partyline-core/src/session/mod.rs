//! Session lifecycle: the supervisor task, its client handle, and the registrar.
//!
//! - `supervisor` -- `ConnectionSupervisor`: transport ownership, keepalive, backoff, auto-rejoin
//! - `client` -- `ChatClient`: cloneable handle issuing commands to the supervisor
//! - `event` -- `SessionEvent` stream delivered to the caller
//! - `registrar` -- `SessionRegistrar`: last successful create/join

pub mod client;
pub mod event;
pub mod registrar;
pub mod supervisor;

pub use client::ChatClient;
pub use event::{CloseReason, RejoinOutcome, SessionEvent};
pub use registrar::SessionRegistrar;
pub use supervisor::ConnectionSupervisor;
