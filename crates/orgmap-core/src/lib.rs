//! # orgmap-core
//!
//! Core abstractions for the orgmap organizational-data layer.
//!
//! This crate holds everything that is pure and shared between the service
//! variants:
//!
//! - **Data Model**: the wire document types (employees, org units,
//!   components) with permissive deserialization
//! - **Snapshot**: one immutable generation of entity maps plus derived
//!   indexes, and every read query over it
//! - **Hierarchy Engine**: ancestor-path and descendant-tree traversals
//!   that tolerate cyclic and dangling parent graphs
//! - **Index Builder**: membership, alias, and Jira-ownership tables
//!   derived once per load
//! - **Source Contract**: the fetch/watch/descriptor trait pair (async and
//!   blocking) with file and in-memory implementations
//! - **Observability**: `tracing` setup helpers
//!
//! ## Crate Boundary
//!
//! `orgmap-core` defines the shared primitives; the stateful store and
//! reload lifecycle live in `orgmap-service`. Nothing here blocks, locks,
//! or mutates after construction.
//!
//! ## Example
//!
//! ```rust
//! use orgmap_core::prelude::*;
//!
//! let bytes = br#"{"lookups": {"employees": {"jsmith": {"uid": "jsmith"}}}}"#;
//! let snapshot = Snapshot::from_json(bytes)?;
//! assert!(snapshot.employee_by_uid("jsmith").is_some());
//! # Ok::<(), orgmap_core::SnapshotError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod hierarchy;
pub mod index;
pub mod model;
pub mod observability;
pub mod snapshot;
pub mod source;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use orgmap_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{SnapshotError, SourceError};
    pub use crate::hierarchy::{HierarchyNode, PathEntry};
    pub use crate::index::{
        AliasIndex, Indexes, JiraClaim, JiraIndex, JiraOwner, MembershipIndex, MembershipRef,
        PROJECT_LEVEL,
    };
    pub use crate::model::{
        Component, Employee, EntityKind, Group, Lookups, Metadata, OrgUnit, ParentRef,
    };
    pub use crate::snapshot::{Affiliation, AffiliationKind, Snapshot, Version};
    pub use crate::source::{
        ChangeCallback, DataSource, FileSource, FileSourceConfig, MemorySource, WatchHandle,
    };
}

// Re-export key types at crate root for ergonomics
pub use error::{SnapshotError, SourceError};
pub use hierarchy::{HierarchyNode, PathEntry};
pub use index::{Indexes, JiraClaim, JiraOwner, MembershipRef, PROJECT_LEVEL};
pub use model::{Component, Employee, EntityKind, Group, Lookups, Metadata, OrgUnit, ParentRef};
pub use observability::{LogFormat, init_logging};
pub use snapshot::{Affiliation, AffiliationKind, Snapshot, Version};
pub use source::{ChangeCallback, DataSource, FileSource, FileSourceConfig, MemorySource, WatchHandle};
