//! # orgmap-service
//!
//! Stateful layer of the orgmap organizational-data system: the versioned
//! snapshot store, the reload lifecycle with its background watch, and the
//! query facade.
//!
//! Two variants share all of their logic through `orgmap-core`:
//!
//! - [`Service`] / [`SnapshotStore`]: asynchronous, tokio-based (primary)
//! - [`blocking::Service`] / [`blocking::SnapshotStore`]: thread-based
//!
//! ## Consistency model
//!
//! Readers get snapshot isolation: a query runs against one immutable
//! generation, acquired with an O(1) pointer clone, and a concurrent
//! reload cannot change what that query sees. Two queries issued around a
//! reload may observe different generations; each is internally
//! consistent. A service that has never loaded answers every query with
//! "not found" rather than an error.
//!
//! ## Example
//!
//! ```rust
//! use orgmap_core::MemorySource;
//! use orgmap_service::Service;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = MemorySource::new(
//!     r#"{"lookups": {"employees": {"jsmith": {"uid": "jsmith"}}}}"#,
//! );
//! let service = Service::new();
//! service.load_once(&source).await?;
//! assert!(service.is_ready().await);
//! assert!(service.employee_by_uid("jsmith").await.is_some());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod blocking;
pub mod error;
pub mod retry;
pub mod service;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{LoadError, WatchError};
pub use retry::RetryPolicy;
pub use service::Service;
pub use store::{LoadedSnapshot, SnapshotStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{LoadError, WatchError};
    pub use crate::retry::RetryPolicy;
    pub use crate::service::Service;
    pub use crate::store::{LoadedSnapshot, SnapshotStore};
}
