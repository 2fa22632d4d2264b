//! Versioned snapshot store for the blocking service.
//!
//! Mirror of [`crate::store::SnapshotStore`] with a `std` lock. The guard
//! is held only for the pointer swap or clone; readers keep their `Arc`
//! and see a fixed generation across concurrent replaces.

use std::sync::{Arc, PoisonError, RwLock};

use orgmap_core::Version;

use crate::store::LoadedSnapshot;

/// Shared, versioned holder of the current snapshot.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Option<Arc<LoadedSnapshot>>>>,
    // Version mirror, refreshed on every replace; serves `version()` and
    // `is_loaded()` without the main guard.
    version: Arc<RwLock<Option<Version>>>,
}

impl SnapshotStore {
    /// An empty store; no snapshot until the first successful load.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new generation. O(1) under the write guard.
    pub fn replace(&self, loaded: LoadedSnapshot) {
        let loaded = Arc::new(loaded);
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *current = Some(Arc::clone(&loaded));
        }
        let mut version = self
            .version
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *version = Some(loaded.version.clone());
    }

    /// Returns the current generation, or `None` before the first load.
    #[must_use]
    pub fn read(&self) -> Option<Arc<LoadedSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version of the current generation, from the mirror.
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any snapshot has ever been installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
