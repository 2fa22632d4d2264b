//! Blocking mirror of the data source contract.
//!
//! Same three operations as the asynchronous trait, for callers running the
//! thread-based service variant without a tokio runtime. [`MemorySource`]
//! implements both contracts; the file source here polls on a plain thread.

use std::sync::mpsc;
use std::thread;

use bytes::Bytes;

use super::{ChangeCallback, FileSourceConfig, MemorySource, WatchHandle};
use crate::error::SourceError;

/// Blocking source of organizational data.
pub trait DataSource: Send + Sync {
    /// Fetches the current document bytes. May block.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the bytes cannot be obtained.
    fn fetch(&self) -> Result<Bytes, SourceError>;

    /// Registers `on_change` to fire whenever new data may be available.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the mechanism cannot be set up.
    fn watch(&self, on_change: ChangeCallback) -> Result<WatchHandle, SourceError>;

    /// Human-readable description of this source, used only in diagnostics.
    fn descriptor(&self) -> String;
}

/// File-backed source for the blocking service.
///
/// Watching polls the file's modification time on a dedicated thread. The
/// thread sleeps on a channel rather than a bare timer, so stopping the
/// watch wakes it immediately and the join is bounded by one in-flight
/// check.
#[derive(Debug, Clone)]
pub struct FileSource {
    config: FileSourceConfig,
}

impl FileSource {
    /// Creates a file source.
    #[must_use]
    pub fn new(config: FileSourceConfig) -> Self {
        Self { config }
    }
}

impl DataSource for FileSource {
    fn fetch(&self) -> Result<Bytes, SourceError> {
        let path = &self.config.path;
        std::fs::read(path).map(Bytes::from).map_err(|cause| {
            SourceError::read_with_cause(format!("read {}", path.display()), cause)
        })
    }

    fn watch(&self, on_change: ChangeCallback) -> Result<WatchHandle, SourceError> {
        let path = self.config.path.clone();
        let interval = self.config.check_interval;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let poller = thread::Builder::new()
            .name("orgmap-file-watch".to_string())
            .spawn(move || {
                let mut last_modified = std::fs::metadata(&path)
                    .ok()
                    .and_then(|meta| meta.modified().ok());
                while let Err(mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                    let modified = std::fs::metadata(&path)
                        .ok()
                        .and_then(|meta| meta.modified().ok());
                    if modified != last_modified {
                        last_modified = modified;
                        on_change();
                    }
                }
            })
            .map_err(|cause| {
                SourceError::watch_setup(format!("spawn poller thread: {cause}"))
            })?;

        Ok(WatchHandle::new(move || {
            let _ = stop_tx.send(());
            let _ = poller.join();
        }))
    }

    fn descriptor(&self) -> String {
        format!("file://{}", self.config.path.display())
    }
}

impl DataSource for MemorySource {
    fn fetch(&self) -> Result<Bytes, SourceError> {
        self.try_fetch()
    }

    fn watch(&self, on_change: ChangeCallback) -> Result<WatchHandle, SourceError> {
        Ok(self.register(on_change))
    }

    fn descriptor(&self) -> String {
        self.describe()
    }
}
