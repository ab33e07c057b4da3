//! # State Persistence
//!
//! Backends that checkpoint the serialized state document, and the signal the
//! engine loop listens on when something asks for an earlier ensure pass.

use crate::error::{Result, StewardError};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Durable storage for the state document
pub trait Backend: Send + Sync {
    /// Persist the full serialized document
    fn checkpoint(&self, data: &[u8]) -> Result<()>;

    /// Ask the engine to run an ensure pass within `delay`
    fn ensure_before(&self, delay: Duration);
}

/// Earliest requested ensure deadline plus a wake-up for the engine loop
#[derive(Debug, Default)]
pub struct EnsureSignal {
    deadline: Mutex<Option<Instant>>,
    notify: Notify,
}

impl EnsureSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a deadline `delay` from now, keeping the earliest one
    pub fn request(&self, delay: Duration) {
        let at = Instant::now() + delay;
        {
            let mut deadline = self.deadline.lock();
            if deadline.map_or(true, |current| at < current) {
                *deadline = Some(at);
            }
        }
        self.notify.notify_one();
    }

    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }

    /// Forget the deadline if it has passed
    pub fn clear_elapsed(&self) {
        let mut deadline = self.deadline.lock();
        if deadline.map_or(false, |at| at <= Instant::now()) {
            *deadline = None;
        }
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Backend writing the document to a file, replacing it atomically
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    signal: Arc<EnsureSignal>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            signal: EnsureSignal::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn signal(&self) -> Arc<EnsureSignal> {
        Arc::clone(&self.signal)
    }
}

impl Backend for FileBackend {
    fn checkpoint(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            StewardError::Persistence(format!(
                "cannot replace {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), bytes = data.len(), "State checkpointed");
        Ok(())
    }

    fn ensure_before(&self, delay: Duration) {
        self.signal.request(delay);
    }
}

/// In-memory backend keeping the last checkpoint, used by tests and tools
#[derive(Debug, Default)]
pub struct MemoryBackend {
    last: Mutex<Option<Vec<u8>>>,
    checkpoints: Mutex<usize>,
    fail: Mutex<bool>,
    signal: Arc<EnsureSignal>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_checkpoint(&self) -> Option<Vec<u8>> {
        self.last.lock().clone()
    }

    pub fn checkpoint_count(&self) -> usize {
        *self.checkpoints.lock()
    }

    /// Make subsequent checkpoints fail until reset
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn signal(&self) -> Arc<EnsureSignal> {
        Arc::clone(&self.signal)
    }
}

impl Backend for MemoryBackend {
    fn checkpoint(&self, data: &[u8]) -> Result<()> {
        if *self.fail.lock() {
            return Err(StewardError::Persistence("checkpoint refused".to_string()));
        }
        *self.last.lock() = Some(data.to_vec());
        *self.checkpoints.lock() += 1;
        Ok(())
    }

    fn ensure_before(&self, delay: Duration) {
        self.signal.request(delay);
    }
}
