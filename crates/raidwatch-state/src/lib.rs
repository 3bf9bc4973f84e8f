//! State reconciliation for RAIDWATCH.
//!
//! Owns the active group collection, applies classified event batches to
//! it, persists it, and clears it after an idle period.

pub mod expiry;
pub mod manager;
pub mod reconcile;
pub mod store;

pub use raidwatch_core as core;
pub use expiry::{ExpiryTick, ExpiryTimer};
pub use manager::{BatchReport, StateManager};
pub use reconcile::{classify_batch, process_event, EventOutcome};
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError};
