//! Inbound frame classification.
//!
//! - `router` -- `EventRouter` turning raw `Frame`s into typed `RoutedEvent`s

pub mod router;

pub use router::{EventRouter, RoutedEvent};
