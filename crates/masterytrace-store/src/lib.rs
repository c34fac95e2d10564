//! masterytrace-store: Storage backends for masterytrace.
//!
//! Provides an in-memory implementation of the core storage traits and
//! JSON snapshots so a store can be persisted between CLI runs.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::Snapshot;
