//! Versioned snapshot store for the asynchronous service.
//!
//! The store holds at most one current generation behind a guard that is
//! only ever held for a pointer operation: `replace` swaps an `Arc`,
//! `read` clones one. Building a snapshot happens entirely before
//! `replace`, and readers scan their clone entirely after releasing the
//! guard, so neither side ever blocks the other for longer than the swap.
//!
//! A reader that keeps its `Arc` sees a fixed generation no matter how
//! many swaps happen meanwhile. Two readers interleaving with a swap may
//! observe different generations; each is internally consistent, and that
//! weak ordering across readers is the intended contract.

use std::sync::Arc;

use orgmap_core::{Snapshot, Version};

/// A snapshot paired with the version descriptor it was installed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSnapshot {
    /// The immutable generation.
    pub snapshot: Snapshot,
    /// Its version descriptor.
    pub version: Version,
}

/// Shared, versioned holder of the current snapshot.
///
/// Cheap to clone; clones share the same state. The store itself cannot
/// fail: every failure belongs to the load pipeline, which never touches
/// the store on an unsuccessful attempt.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Arc<tokio::sync::RwLock<Option<Arc<LoadedSnapshot>>>>,
    // Version mirror, refreshed on every replace. Serves `version()` and
    // `is_loaded()` without touching the main guard; may trail the main
    // pointer by one generation mid-replace, which callers accept.
    version: Arc<std::sync::RwLock<Option<Version>>>,
}

impl SnapshotStore {
    /// An empty store; no snapshot until the first successful load.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new generation. O(1) under the write guard.
    pub async fn replace(&self, loaded: LoadedSnapshot) {
        let loaded = Arc::new(loaded);
        {
            let mut current = self.current.write().await;
            *current = Some(Arc::clone(&loaded));
        }
        let mut version = self
            .version
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *version = Some(loaded.version.clone());
    }

    /// Returns the current generation, or `None` before the first load.
    ///
    /// The guard is released before returning; the caller's `Arc` stays
    /// valid and fixed across any concurrent `replace`.
    pub async fn read(&self) -> Option<Arc<LoadedSnapshot>> {
        self.current.read().await.clone()
    }

    /// Version of the current generation, from the mirror.
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.version
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Whether any snapshot has ever been installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.version
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}
