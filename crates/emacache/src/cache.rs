//! MediaCache: expiring cache of encoded media over a KvStore
//!
//! Recency is write time only. There is no background sweep and reads do
//! not refresh an entry; old records leave through expiry-on-lookup, bulk
//! eviction under quota pressure, or explicit cleanup.

use std::sync::Arc;

use emastore::{Error, KvStore, Result};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::entry::{parse_timestamp, CachedMediaEntry, MediaKind};
use crate::stats::CacheStats;

/// Expiring cache of data-URI payloads keyed by source URL
#[derive(Debug)]
pub struct MediaCache {
    /// Underlying key-value store
    store: KvStore,

    /// Source of entry timestamps
    clock: Arc<dyn Clock>,

    /// Expiry and recovery settings
    config: CacheConfig,

    /// Cache statistics
    stats: CacheStats,
}

impl MediaCache {
    /// Create a cache on the wall clock with default settings
    pub fn new(store: KvStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), CacheConfig::default())
    }

    /// Create a cache with an explicit clock and settings
    pub fn with_clock(store: KvStore, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
            stats: CacheStats::new(),
        }
    }

    /// Settings this cache runs with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn is_expired(&self, timestamp: i64) -> bool {
        // Stored timestamps are untrusted; extremes must not overflow.
        self.clock.now_millis().saturating_sub(timestamp) > self.config.expiry_millis()
    }

    /// Look up a source, dropping the record if it has expired
    pub fn lookup(&self, kind: MediaKind, source: &str) -> Option<CachedMediaEntry> {
        let key = kind.key(source);

        let Some(raw) = self.store.get(&key) else {
            self.stats.record_miss();
            debug!(source, ?kind, "cache miss");
            return None;
        };

        let mut entry: CachedMediaEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(source, ?kind, error = %e, "unreadable cache record");
                self.stats.record_miss();
                return None;
            }
        };

        if self.is_expired(entry.timestamp) {
            self.store.remove(&key);
            self.stats.record_expired();
            self.stats.record_miss();
            debug!(source, ?kind, "cache entry expired");
            return None;
        }

        entry.source = source.to_string();
        self.stats.record_hit();
        debug!(source, ?kind, "cache hit");
        Some(entry)
    }

    /// Write an entry stamped with the current time, replacing any prior one.
    ///
    /// `alt` is kept for images (empty when not given) and ignored for audio.
    pub fn store(
        &self,
        kind: MediaKind,
        source: &str,
        payload: &str,
        alt: Option<&str>,
    ) -> Result<()> {
        let entry = CachedMediaEntry {
            source: source.to_string(),
            data: payload.to_string(),
            timestamp: self.clock.now_millis(),
            alt: match kind {
                MediaKind::Image => Some(alt.unwrap_or_default().to_string()),
                MediaKind::Audio => None,
            },
        };

        let raw = serde_json::to_string(&entry).map_err(|e| Error::Parse(e.to_string()))?;

        match self.store.set(&kind.key(source), &raw) {
            Ok(()) => {
                self.stats.record_write();
                Ok(())
            }
            Err(e) => {
                self.stats.record_write_failure();
                Err(e)
            }
        }
    }

    /// Every cache key currently in the store, in enumeration order
    fn cache_keys(&self) -> Vec<String> {
        (0..self.store.key_count())
            .filter_map(|i| self.store.key_at(i))
            .filter(|key| MediaKind::parse_key(key).is_some())
            .collect()
    }

    /// Remove the oldest `fraction` of timestamped cache records.
    ///
    /// Records without a readable timestamp are neither counted nor
    /// removed. Returns the number of records removed.
    pub fn evict_oldest_fraction(&self, fraction: f64) -> usize {
        let mut items: Vec<(String, i64)> = self
            .cache_keys()
            .into_iter()
            .filter_map(|key| {
                let timestamp = parse_timestamp(&self.store.get(&key)?)?;
                Some((key, timestamp))
            })
            .collect();

        // Stable: equal timestamps keep enumeration order.
        items.sort_by_key(|(_, timestamp)| *timestamp);

        let count = (items.len() as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
        for (key, _) in items.iter().take(count) {
            self.store.remove(key);
        }

        self.stats.record_evictions(count);
        info!(removed = count, scanned = items.len(), "evicted oldest cache entries");
        count
    }

    /// Remove every expired record, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for key in self.cache_keys() {
            let expired = self
                .store
                .get(&key)
                .and_then(|raw| parse_timestamp(&raw))
                .is_some_and(|timestamp| self.is_expired(timestamp));

            if expired {
                self.store.remove(&key);
                removed += 1;
            }
        }

        self.stats.record_evictions(removed);
        info!(removed, "purged expired cache entries");
        removed
    }

    /// Remove every cache record, returning how many were removed
    pub fn clear(&self) -> usize {
        let keys = self.cache_keys();
        for key in &keys {
            self.store.remove(key);
        }

        info!(removed = keys.len(), "cleared media cache");
        keys.len()
    }

    /// Sources with a record of the given kind (expired ones included)
    pub fn sources(&self, kind: MediaKind) -> Vec<String> {
        self.cache_keys()
            .iter()
            .filter_map(|key| match MediaKind::parse_key(key) {
                Some((k, source)) if k == kind => Some(source.to_string()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use emastore::MemoryBackend;
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn cache_with_clock() -> (MediaCache, Arc<ManualClock>, KvStore) {
        let store = KvStore::memory();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = MediaCache::with_clock(store.clone(), clock.clone(), CacheConfig::default());
        (cache, clock, store)
    }

    #[test]
    fn test_store_then_lookup() {
        let (cache, clock, _) = cache_with_clock();

        cache
            .store(MediaKind::Image, "https://a/1.png", "data:image/png;base64,AA", Some(">_<"))
            .unwrap();
        clock.advance(DAY);

        let entry = cache.lookup(MediaKind::Image, "https://a/1.png").unwrap();
        assert_eq!(entry.data, "data:image/png;base64,AA");
        assert_eq!(entry.alt.as_deref(), Some(">_<"));
        assert_eq!(entry.source, "https://a/1.png");
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let (cache, _, _) = cache_with_clock();

        cache.store(MediaKind::Audio, "same", "audio", None).unwrap();

        assert!(cache.lookup(MediaKind::Image, "same").is_none());
        let entry = cache.lookup(MediaKind::Audio, "same").unwrap();
        assert_eq!(entry.alt, None);
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let (cache, clock, store) = cache_with_clock();

        cache.store(MediaKind::Audio, "clip.ogg", "data", None).unwrap();
        clock.advance(DAY + Duration::from_millis(1));

        assert!(cache.lookup(MediaKind::Audio, "clip.ogg").is_none());
        assert_eq!(store.get("audio_cache_clip.ogg"), None);
        assert_eq!(cache.stats().expired(), 1);
    }

    #[test]
    fn test_overwrite_resets_timestamp() {
        let (cache, clock, _) = cache_with_clock();

        cache.store(MediaKind::Image, "u", "old", Some("a")).unwrap();
        clock.advance(DAY - Duration::from_secs(1));
        cache.store(MediaKind::Image, "u", "new", Some("b")).unwrap();
        clock.advance(Duration::from_secs(2));

        let entry = cache.lookup(MediaKind::Image, "u").unwrap();
        assert_eq!(entry.data, "new");
        assert_eq!(entry.alt.as_deref(), Some("b"));
    }

    #[test]
    fn test_unreadable_record_is_a_miss() {
        let (cache, _, store) = cache_with_clock();
        store.set("image_cache_bad", "{not json").unwrap();

        assert!(cache.lookup(MediaKind::Image, "bad").is_none());
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_evict_oldest_half() {
        let (cache, clock, store) = cache_with_clock();

        for i in 0..5 {
            cache.store(MediaKind::Image, &format!("img{}", i), "d", None).unwrap();
            clock.advance(Duration::from_secs(1));
        }
        store.set("image_cache_garbage", "nope").unwrap();
        store.set("ema_puppy_click_count", "9").unwrap();

        let removed = cache.evict_oldest_fraction(0.5);

        assert_eq!(removed, 2);
        assert_eq!(store.get("image_cache_img0"), None);
        assert_eq!(store.get("image_cache_img1"), None);
        assert!(store.get("image_cache_img2").is_some());
        assert!(store.get("image_cache_garbage").is_some());
        assert_eq!(store.get("ema_puppy_click_count").as_deref(), Some("9"));
    }

    #[test]
    fn test_evict_considers_both_kinds() {
        let (cache, clock, store) = cache_with_clock();

        cache.store(MediaKind::Audio, "a0", "d", None).unwrap();
        clock.advance(Duration::from_secs(1));
        cache.store(MediaKind::Image, "i1", "d", None).unwrap();
        clock.advance(Duration::from_secs(1));
        cache.store(MediaKind::Audio, "a2", "d", None).unwrap();
        clock.advance(Duration::from_secs(1));
        cache.store(MediaKind::Image, "i3", "d", None).unwrap();

        assert_eq!(cache.evict_oldest_fraction(0.5), 2);
        assert_eq!(store.get("audio_cache_a0"), None);
        assert_eq!(store.get("image_cache_i1"), None);
        assert!(store.get("audio_cache_a2").is_some());
    }

    #[test]
    fn test_evict_on_tiny_cache_rounds_down() {
        let (cache, _, _) = cache_with_clock();
        cache.store(MediaKind::Image, "only", "d", None).unwrap();

        assert_eq!(cache.evict_oldest_fraction(0.5), 0);
        assert!(cache.lookup(MediaKind::Image, "only").is_some());
    }

    #[test]
    fn test_purge_expired_and_clear() {
        let (cache, clock, store) = cache_with_clock();

        cache.store(MediaKind::Image, "old", "d", None).unwrap();
        clock.advance(DAY + Duration::from_secs(1));
        cache.store(MediaKind::Image, "fresh", "d", None).unwrap();
        store.set("audio_settings", "[\"Kya\"]").unwrap();

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.sources(MediaKind::Image), vec!["fresh".to_string()]);

        assert_eq!(cache.clear(), 1);
        assert!(cache.sources(MediaKind::Image).is_empty());
        assert!(store.get("audio_settings").is_some());
    }

    #[test]
    fn test_store_reports_quota() {
        let store = KvStore::new(MemoryBackend::with_quota(64));
        let cache = MediaCache::new(store);

        let err = cache
            .store(MediaKind::Image, "big", &"x".repeat(100), None)
            .unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(cache.stats().write_failures(), 1);
    }

    #[test]
    fn test_extreme_timestamps_expire_without_overflow() {
        let (cache, _, store) = cache_with_clock();
        store
            .set(
                "image_cache_x",
                r#"{"data":"d","timestamp":-9223372036854775808,"alt":""}"#,
            )
            .unwrap();
        store
            .set("audio_cache_y", r#"{"data":"d","timestamp":-1e30}"#)
            .unwrap();

        assert!(cache.lookup(MediaKind::Image, "x").is_none());
        assert_eq!(store.get("image_cache_x"), None);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(store.get("audio_cache_y"), None);
    }

    #[test]
    fn test_far_future_timestamp_is_not_expired() {
        let (cache, _, store) = cache_with_clock();
        store
            .set(
                "image_cache_z",
                r#"{"data":"d","timestamp":9223372036854775807,"alt":""}"#,
            )
            .unwrap();

        assert!(cache.lookup(MediaKind::Image, "z").is_some());
        assert_eq!(cache.purge_expired(), 0);
    }
}
