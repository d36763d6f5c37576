//! Store adapter
//!
//! `KvStore` is the only way the rest of the system touches persisted
//! state. Backends are fallible; the adapter never lets a fault escape as a
//! panic and collapses read faults into "absent" for ordinary callers.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::memory::{DisabledBackend, MemoryBackend};

/// Raw storage backend
pub trait Backend: Send + Sync {
    /// Read a value
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key (absent keys are not an error)
    fn delete(&self, key: &str) -> Result<()>;

    /// Number of live keys
    fn count(&self) -> Result<usize>;

    /// Key at an enumeration position
    fn key(&self, index: usize) -> Result<Option<String>>;
}

/// Outcome of a tagged read
#[derive(Debug)]
pub enum Lookup {
    /// Key holds a value
    Found(String),
    /// Key was never set (or was removed)
    Absent,
    /// Backend failed to answer
    Failed(Error),
}

impl Lookup {
    /// Collapse to the caller-facing view: anything but a value is `None`
    pub fn into_option(self) -> Option<String> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Absent | Lookup::Failed(_) => None,
        }
    }
}

/// Shared handle to a key-value backend
#[derive(Clone)]
pub struct KvStore {
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore").finish_non_exhaustive()
    }
}

impl KvStore {
    /// Wrap a backend
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wrap an already shared backend
    pub fn from_shared(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Unbounded in-memory store
    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Store whose every operation fails
    pub fn disabled() -> Self {
        Self::new(DisabledBackend)
    }

    /// Tagged read that keeps "never set" and "read failed" apart
    pub fn read(&self, key: &str) -> Lookup {
        match self.backend.load(key) {
            Ok(Some(value)) => Lookup::Found(value),
            Ok(None) => Lookup::Absent,
            Err(e) => {
                warn!(key, error = %e, "storage read failed");
                Lookup::Failed(e)
            }
        }
    }

    /// Read a value; read faults look the same as a missing key
    pub fn get(&self, key: &str) -> Option<String> {
        self.read(key).into_option()
    }

    /// Write a value
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.backend.save(key, value).inspect_err(|e| {
            warn!(key, error = %e, "storage write failed");
        })
    }

    /// Remove a key; faults are logged and dropped
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.delete(key) {
            warn!(key, error = %e, "storage remove failed");
        }
    }

    /// Number of keys (0 when the backend cannot answer)
    pub fn key_count(&self) -> usize {
        self.backend.count().unwrap_or_else(|e| {
            warn!(error = %e, "storage count failed");
            0
        })
    }

    /// Key at an enumeration position
    pub fn key_at(&self, index: usize) -> Option<String> {
        self.backend.key(index).unwrap_or_else(|e| {
            warn!(index, error = %e, "storage enumeration failed");
            None
        })
    }

    /// Snapshot of every key starting with `prefix`
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        (0..self.key_count())
            .filter_map(|i| self.key_at(i))
            .filter(|key| key.starts_with(prefix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = KvStore::memory();
        store.set("ema_puppy_click_count", "3").unwrap();

        assert_eq!(store.get("ema_puppy_click_count").as_deref(), Some("3"));
        assert!(matches!(store.read("missing"), Lookup::Absent));
    }

    #[test]
    fn test_disabled_collapses_to_absent() {
        let store = KvStore::disabled();

        assert!(matches!(store.read("k"), Lookup::Failed(Error::Unavailable)));
        assert_eq!(store.get("k"), None);
        assert!(store.set("k", "v").is_err());
        store.remove("k");
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.key_at(0), None);
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = KvStore::memory();
        store.set("image_cache_a", "1").unwrap();
        store.set("audio_settings", "[]").unwrap();
        store.set("image_cache_b", "2").unwrap();

        assert_eq!(
            store.keys_with_prefix("image_cache_"),
            vec!["image_cache_a".to_string(), "image_cache_b".to_string()]
        );
    }

    #[test]
    fn test_quota_failure_is_distinguishable() {
        let store = KvStore::new(MemoryBackend::with_quota(8));
        let err = store.set("key", "too long value").unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("key"), None);
    }
}
