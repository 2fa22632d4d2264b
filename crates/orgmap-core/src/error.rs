//! Error types and result aliases for the core crate.
//!
//! Two failure families exist at this layer: trouble obtaining bytes from a
//! data source, and trouble turning bytes into a snapshot. Lifecycle-level
//! errors (retry exhaustion, watcher misuse) live in the service crate.

/// Errors raised by a data source while fetching bytes or registering a
/// change watch.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Reading from the underlying medium failed.
    #[error("read failed: {message}")]
    Read {
        /// Description of the read failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The source is temporarily unable to serve data.
    #[error("source unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },

    /// Registering the change-notification mechanism failed.
    #[error("watch setup failed: {message}")]
    WatchSetup {
        /// Description of the setup failure.
        message: String,
    },
}

impl SourceError {
    /// Creates a read error with the given message.
    #[must_use]
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a read error with a source cause.
    #[must_use]
    pub fn read_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Read {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Creates an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a watch-setup error with the given message.
    #[must_use]
    pub fn watch_setup(message: impl Into<String>) -> Self {
        Self::WatchSetup {
            message: message.into(),
        }
    }
}

/// Errors raised while building a [`Snapshot`](crate::snapshot::Snapshot)
/// from raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The payload is not well-formed JSON for the expected document.
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but is missing required substructure.
    #[error("invalid document: {reason}")]
    Structural {
        /// What required substructure was missing.
        reason: String,
    },
}

impl SnapshotError {
    /// Creates a structural error with the given reason.
    #[must_use]
    pub fn structural(reason: impl Into<String>) -> Self {
        Self::Structural {
            reason: reason.into(),
        }
    }
}
