//! gradesync-core: Grade reconciliation and dual-store synchronization.
//!
//! This crate defines the data model, the store traits, and the pure
//! components (grouping, consistency checks, canonical selection) that the
//! engine runs inside a per-exam critical section before converging the
//! primary and secondary grade stores.

pub mod consistency;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod model;
pub mod parser;
pub mod report;
pub mod selection;
pub mod statistics;
pub mod sync;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ReconcileError, StoreError};
