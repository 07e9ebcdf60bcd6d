//! Plexus Cache - Node cache, repositories, and optimistic update
//! orchestration for the plexus sync layer.
//!
//! This crate holds the reconciliation engine's stateful heart:
//!
//! - `DataObject`: the versioned per-node cache entity
//! - `Repository`: the per-node-type id → data object map
//! - `OptimisticOrchestrator`: in-flight local writes with rollback
//!
//! Everything is single-threaded and event-driven; shared state is `Rc`
//! and `RefCell`, never locks.

mod data_object;
mod orchestrator;
mod repository;

pub use data_object::{DataObject, DataSnapshot, UNSET_VERSION};
pub use orchestrator::{OptimisticOrchestrator, UpdateHandle, UpdateRequest};
pub use repository::Repository;
