//! Session resilience logic and port definitions for partyline.
//!
//! This crate defines the "ports" (`Transport`, `PersistenceStore`) that the
//! infrastructure layer implements, plus the logic that sits on top of them:
//! history reconciliation, frame routing, session registration, and the
//! connection supervisor. It depends only on `partyline-types` -- never on
//! `partyline-infra` or any socket/database crate.

pub mod history;
pub mod routing;
pub mod session;
pub mod storage;
pub mod transport;
