//! Message history reconciliation.
//!
//! - `reconciler` -- `MessageReconciler`: dedup, system-message normalization, ordering

pub mod reconciler;

pub use reconciler::MessageReconciler;
