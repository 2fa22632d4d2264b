//! Error types for load and watch operations.
//!
//! Queries never error: a missing key and a never-loaded store both answer
//! "not found". Errors exist only on the write path, loading a snapshot
//! and managing the watch, and split into the retryable fetch family and
//! the never-retryable parse/structural family. Watcher misuse is its own
//! type so callers can tell a programming error from bad data.

use orgmap_core::{SnapshotError, SourceError};

/// Errors from a single load attempt.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The source failed to produce bytes, after retries.
    #[error("fetch from {descriptor} failed after {attempts} attempt(s): {cause}")]
    Fetch {
        /// Description of the source.
        descriptor: String,
        /// How many fetch attempts were made.
        attempts: u32,
        /// The last underlying failure.
        #[source]
        cause: SourceError,
    },

    /// The fetched bytes are not a well-formed document. Never retried:
    /// the same payload would fail the same way.
    #[error("malformed document from {descriptor}: {cause}")]
    Parse {
        /// Description of the source.
        descriptor: String,
        /// The deserialization failure.
        #[source]
        cause: serde_json::Error,
    },

    /// The document parsed but is missing required substructure. Never
    /// retried.
    #[error("invalid document from {descriptor}: {reason}")]
    Structural {
        /// Description of the source.
        descriptor: String,
        /// What required substructure was missing.
        reason: String,
    },
}

impl LoadError {
    /// Maps a snapshot construction failure onto the load taxonomy.
    #[must_use]
    pub fn from_snapshot(descriptor: &str, error: SnapshotError) -> Self {
        match error {
            SnapshotError::Parse(cause) => Self::Parse {
                descriptor: descriptor.to_string(),
                cause,
            },
            SnapshotError::Structural { reason } => Self::Structural {
                descriptor: descriptor.to_string(),
                reason,
            },
        }
    }
}

/// Errors from starting a data source watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A watch is already active on this service instance. This is caller
    /// misuse, not a data problem.
    #[error("a data source watch is already running on this service")]
    AlreadyRunning,

    /// The source could not set up its change-notification mechanism.
    #[error("watch setup on {descriptor} failed: {cause}")]
    Setup {
        /// Description of the source.
        descriptor: String,
        /// The underlying setup failure.
        #[source]
        cause: SourceError,
    },

    /// The initial load failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}
