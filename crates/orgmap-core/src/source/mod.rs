//! Data source contract and the in-tree source implementations.
//!
//! A source does exactly three things: hand over the raw document bytes,
//! register a change-notification mechanism, and describe itself for
//! diagnostics. Everything else (parsing, retrying, swapping) belongs to
//! the layers above. Object-storage clients and other external backends
//! implement [`DataSource`] (or its [`blocking`] mirror) out of tree.
//!
//! A change notification means "new data may be available", never "data
//! certainly changed"; the reload pipeline treats every notification as a
//! hint to attempt a reload.

pub mod blocking;

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SourceError;

/// Callback invoked by a source whenever new data may be available.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Default polling interval for file-backed sources.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Asynchronous source of organizational data.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches the current document bytes.
    ///
    /// May be slow; callers retry transient failures with backoff.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the bytes cannot be obtained.
    async fn fetch(&self) -> Result<Bytes, SourceError>;

    /// Registers `on_change` to fire whenever new data may be available.
    ///
    /// The returned handle cancels the notification mechanism when stopped
    /// or dropped; after [`WatchHandle::stop`] returns, `on_change` fires
    /// no more.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the mechanism cannot be set up.
    fn watch(&self, on_change: ChangeCallback) -> Result<WatchHandle, SourceError>;

    /// Human-readable description of this source, used only in diagnostics.
    fn descriptor(&self) -> String;
}

/// Handle to an active change watch.
///
/// Stopping cancels the source's notifier and joins any thread or task it
/// spawned; pollers sleep on an interruptible channel, so stopping is
/// bounded by one in-flight check rather than a full poll interval.
/// Dropping the handle stops it as well.
pub struct WatchHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    /// Wraps a cancellation routine.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel, for sources that push notifications
    /// without owning a poller.
    #[must_use]
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancels the watch. Idempotent via [`Drop`].
    pub fn stop(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Configuration for file-backed sources.
#[derive(Debug, Clone)]
pub struct FileSourceConfig {
    /// Path of the document file.
    pub path: PathBuf,
    /// How often the watcher probes the file's modification time.
    pub check_interval: Duration,
}

impl FileSourceConfig {
    /// Configuration with the default check interval.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Overrides the check interval.
    #[must_use]
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }
}

/// File-backed source for the asynchronous service.
///
/// Watching polls the file's modification time on a background task.
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

#[async_trait]
impl DataSource for FileSource {
    async fn fetch(&self) -> Result<Bytes, SourceError> {
        let path = &self.config.path;
        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|cause| {
                SourceError::read_with_cause(format!("read {}", path.display()), cause)
            })
    }

    /// Spawns the polling task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    fn watch(&self, on_change: ChangeCallback) -> Result<WatchHandle, SourceError> {
        let path = self.config.path.clone();
        let interval = self.config.check_interval;
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut last_modified = tokio::fs::metadata(&path)
                .await
                .ok()
                .and_then(|meta| meta.modified().ok());
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    () = tokio::time::sleep(interval) => {
                        let modified = tokio::fs::metadata(&path)
                            .await
                            .ok()
                            .and_then(|meta| meta.modified().ok());
                        if modified != last_modified {
                            last_modified = modified;
                            on_change();
                        }
                    }
                }
            }
        });

        Ok(WatchHandle::new(move || {
            let _ = stop_tx.send(());
            task.abort();
        }))
    }

    fn descriptor(&self) -> String {
        format!("file://{}", self.config.path.display())
    }
}

/// In-memory source for testing.
///
/// Serves a byte buffer, counts fetches, can script upcoming fetch
/// failures, and fires registered change callbacks on demand. Implements
/// both the asynchronous and the [`blocking`] contract so one instance can
/// drive either service variant.
#[derive(Clone)]
pub struct MemorySource {
    label: String,
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    data: RwLock<Bytes>,
    scripted_failures: Mutex<VecDeque<String>>,
    fetches: AtomicUsize,
    listeners: Mutex<Vec<(u64, ChangeCallback)>>,
    next_listener: AtomicU64,
}

impl MemorySource {
    /// A source serving `data` under the label `memory`.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_label("memory", data)
    }

    /// A source serving `data` under a custom label.
    #[must_use]
    pub fn with_label(label: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            inner: Arc::new(MemoryInner {
                data: RwLock::new(data.into()),
                scripted_failures: Mutex::new(VecDeque::new()),
                fetches: AtomicUsize::new(0),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Replaces the served bytes without notifying watchers.
    pub fn set_data(&self, data: impl Into<Bytes>) {
        let mut guard = self
            .inner
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = data.into();
    }

    /// Scripts the next `times` fetches to fail with `reason`.
    pub fn fail_next_fetches(&self, times: usize, reason: &str) {
        let mut failures = self
            .inner
            .scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for _ in 0..times {
            failures.push_back(reason.to_string());
        }
    }

    /// Number of fetch calls so far, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Fires every registered change callback once.
    pub fn signal_change(&self) {
        let callbacks: Vec<ChangeCallback> = {
            let listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            listeners.iter().map(|(_, callback)| callback.clone()).collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    fn try_fetch(&self) -> Result<Bytes, SourceError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .inner
            .scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        if let Some(reason) = scripted {
            return Err(SourceError::unavailable(reason));
        }
        let guard = self
            .inner
            .data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn register(&self, on_change: ChangeCallback) -> WatchHandle {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            listeners.push((id, on_change));
        }
        let inner = Arc::clone(&self.inner);
        WatchHandle::new(move || {
            let mut listeners = inner
                .listeners
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            listeners.retain(|(listener_id, _)| *listener_id != id);
        })
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.label)
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("label", &self.label)
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch(&self) -> Result<Bytes, SourceError> {
        self.try_fetch()
    }

    fn watch(&self, on_change: ChangeCallback) -> Result<WatchHandle, SourceError> {
        Ok(self.register(on_change))
    }

    fn descriptor(&self) -> String {
        self.describe()
    }
}
