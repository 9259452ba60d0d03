//! State store trait definition.
//!
//! A state store reads and overwrites whole run-state documents addressed by
//! path. The infrastructure layer (cadence-infra) implements it on the local
//! filesystem; [`MemoryStateStore`] backs tests and embedded use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Errors from state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Storage port for persisted run state.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait StateStore: Send + Sync {
    /// Read the document at `path`. Returns `Ok(None)` when nothing is stored.
    fn load(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Option<String>, StateError>> + Send;

    /// Replace the document at `path` with `contents` in full.
    ///
    /// Implementations must never leave a partially written document behind.
    fn save(
        &self,
        path: &Path,
        contents: &str,
    ) -> impl std::future::Future<Output = Result<(), StateError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-process state store keyed by path.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    documents: Mutex<HashMap<PathBuf, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a document directly.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        if let Ok(mut docs) = self.documents.lock() {
            docs.insert(path.into(), contents.into());
        }
    }

    /// Current contents of a document.
    pub fn get(&self, path: &Path) -> Option<String> {
        self.documents.lock().ok()?.get(path).cloned()
    }

    /// Make every subsequent `save` fail (simulates an unwritable disk).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn load(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Option<String>, StateError>> + Send {
        let result = self
            .documents
            .lock()
            .map(|docs| docs.get(path).cloned())
            .map_err(|e| StateError::Unavailable(e.to_string()));
        async move { result }
    }

    fn save(
        &self,
        path: &Path,
        contents: &str,
    ) -> impl std::future::Future<Output = Result<(), StateError>> + Send {
        let result = if self.fail_writes.load(Ordering::SeqCst) {
            Err(StateError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other("writes disabled"),
            })
        } else {
            self.documents
                .lock()
                .map(|mut docs| {
                    docs.insert(path.to_path_buf(), contents.to_string());
                    self.writes.fetch_add(1, Ordering::SeqCst);
                })
                .map_err(|e| StateError::Unavailable(e.to_string()))
        };
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        let path = Path::new("runs/a.json");
        assert_eq!(store.load(path).await.unwrap(), None);

        store.save(path, "{\"x\":1}").await.unwrap();
        assert_eq!(store.load(path).await.unwrap().as_deref(), Some("{\"x\":1}"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_failing_writes() {
        let store = MemoryStateStore::new();
        store.insert("s.json", "old");
        store.set_fail_writes(true);

        let err = store.save(Path::new("s.json"), "new").await.unwrap_err();
        assert!(err.to_string().contains("s.json"));
        assert_eq!(store.get(Path::new("s.json")).as_deref(), Some("old"));
        assert_eq!(store.write_count(), 0);
    }
}
