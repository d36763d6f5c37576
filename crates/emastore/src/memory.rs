//! In-memory and disabled backends

use parking_lot::RwLock;

use crate::adapter::Backend;
use crate::error::{Error, Result};
use crate::index::OrderedIndex;

/// Volatile backend, optionally bounded by a character quota
#[derive(Debug)]
pub struct MemoryBackend {
    index: RwLock<OrderedIndex>,
}

impl MemoryBackend {
    /// Unbounded store
    pub fn new() -> Self {
        Self {
            index: RwLock::new(OrderedIndex::new(None)),
        }
    }

    /// Store that rejects writes pushing the live size past `quota` chars
    pub fn with_quota(quota: usize) -> Self {
        Self {
            index: RwLock::new(OrderedIndex::new(Some(quota))),
        }
    }

    /// Live size in characters
    pub fn used(&self) -> usize {
        self.index.read().used()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.index.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut index = self.index.write();
        index.check_fit(key, value)?;
        index.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.index.write().remove(key);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.index.read().len())
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        Ok(self.index.read().key_at(index).cloned())
    }
}

/// Backend standing in for storage that is switched off or failed to open
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

impl Backend for DisabledBackend {
    fn load(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Unavailable)
    }

    fn save(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Unavailable)
    }

    fn delete(&self, _key: &str) -> Result<()> {
        Err(Error::Unavailable)
    }

    fn count(&self) -> Result<usize> {
        Err(Error::Unavailable)
    }

    fn key(&self, _index: usize) -> Result<Option<String>> {
        Err(Error::Unavailable)
    }
}
