//! Insertion-ordered key index with quota accounting
//!
//! Size is counted in characters (`key.chars() + value.chars()`), which is
//! how browser storage quotas are expressed. Overwriting a key keeps its
//! enumeration position.

use ahash::AHashMap;

use crate::error::{Error, Result};

/// Live entries of a store, enumerable by position
#[derive(Debug, Default)]
pub(crate) struct OrderedIndex {
    map: AHashMap<String, String>,
    order: Vec<String>,
    used: usize,
    quota: Option<usize>,
}

fn entry_size(key: &str, value: &str) -> usize {
    key.chars().count() + value.chars().count()
}

impl OrderedIndex {
    pub(crate) fn new(quota: Option<usize>) -> Self {
        Self {
            quota,
            ..Self::default()
        }
    }

    /// Check that writing `key = value` stays within the quota
    pub(crate) fn check_fit(&self, key: &str, value: &str) -> Result<()> {
        let Some(quota) = self.quota else {
            return Ok(());
        };

        let released = self
            .map
            .get(key)
            .map(|old| entry_size(key, old))
            .unwrap_or(0);
        let needed = self.used - released + entry_size(key, value);

        if needed > quota {
            return Err(Error::QuotaExceeded { needed, quota });
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, key: &str, value: &str) {
        let size = entry_size(key, value);
        match self.map.get_mut(key) {
            Some(old) => {
                self.used = self.used - entry_size(key, old) + size;
                *old = value.to_string();
            }
            None => {
                self.used += size;
                self.map.insert(key.to_string(), value.to_string());
                self.order.push(key.to_string());
            }
        }
    }

    /// Remove a key, returning whether it was present
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        match self.map.remove(key) {
            Some(old) => {
                self.used -= entry_size(key, &old);
                self.order.retain(|k| k != key);
                true
            }
            None => false,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<&String> {
        self.order.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    /// Entries in enumeration order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.order
            .iter()
            .filter_map(|k| self.map.get(k).map(|v| (k, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_keeps_position() {
        let mut index = OrderedIndex::new(None);
        index.insert("a", "1");
        index.insert("b", "2");
        index.insert("a", "3");

        assert_eq!(index.key_at(0).map(String::as_str), Some("a"));
        assert_eq!(index.get("a").map(String::as_str), Some("3"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_usage_tracks_chars() {
        let mut index = OrderedIndex::new(None);
        index.insert("ab", "酱酱");
        assert_eq!(index.used(), 4);

        index.insert("ab", "x");
        assert_eq!(index.used(), 3);

        index.remove("ab");
        assert_eq!(index.used(), 0);
    }

    #[test]
    fn test_quota_counts_released_space() {
        let mut index = OrderedIndex::new(Some(10));
        index.insert("k", "123456789");

        assert!(index.check_fit("k", "987654321").is_ok());
        let err = index.check_fit("j", "1").unwrap_err();
        assert!(err.is_quota_exceeded());
    }
}
