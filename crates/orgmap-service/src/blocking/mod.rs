//! Thread-based variant of the store and service.
//!
//! Same contracts as the asynchronous layer (snapshot-isolated reads, O(1)
//! swap, cooperative watch shutdown) expressed with `std` primitives for
//! embedders without a tokio runtime. All query logic lives on
//! [`Snapshot`](orgmap_core::Snapshot); the wrappers here only differ from
//! their async siblings in how they guard the pointer and how fetch and
//! watch wait.

mod service;
mod store;

pub use service::Service;
pub use store::SnapshotStore;
