//! Media cache counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running totals of cache activity since creation or the last reset
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped on lookup because they were too old
    pub expired: u64,
    /// Successful writes
    pub writes: u64,
    /// Rejected writes
    pub write_failures: u64,
    /// Entries dropped by bulk eviction
    pub evictions: u64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

impl CacheStats {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> [&AtomicU64; 6] {
        [
            &self.hits,
            &self.misses,
            &self.expired,
            &self.writes,
            &self.write_failures,
            &self.evictions,
        ]
    }

    /// A lookup returned an entry
    pub fn record_hit(&self) {
        bump(&self.hits, 1);
    }

    /// A lookup returned nothing
    pub fn record_miss(&self) {
        bump(&self.misses, 1);
    }

    /// A lookup found a record past its expiry
    pub fn record_expired(&self) {
        bump(&self.expired, 1);
    }

    /// A record was written
    pub fn record_write(&self) {
        bump(&self.writes, 1);
    }

    /// The store refused a record
    pub fn record_write_failure(&self) {
        bump(&self.write_failures, 1);
    }

    /// `count` records were removed in bulk
    pub fn record_evictions(&self, count: usize) {
        bump(&self.evictions, count as u64);
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> u64 {
        read(&self.hits)
    }

    /// Lookups that found nothing usable
    pub fn misses(&self) -> u64 {
        read(&self.misses)
    }

    /// Records dropped on lookup for age
    pub fn expired(&self) -> u64 {
        read(&self.expired)
    }

    /// Records written
    pub fn writes(&self) -> u64 {
        read(&self.writes)
    }

    /// Writes the store refused
    pub fn write_failures(&self) -> u64 {
        read(&self.write_failures)
    }

    /// Records removed by eviction or purge
    pub fn evictions(&self) -> u64 {
        read(&self.evictions)
    }

    /// Share of lookups that hit; 0 before any lookup
    pub fn hit_ratio(&self) -> f64 {
        let (hits, misses) = (self.hits(), self.misses());
        match hits + misses {
            0 => 0.0,
            lookups => hits as f64 / lookups as f64,
        }
    }

    /// Every counter read at once
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            expired: self.expired(),
            writes: self.writes(),
            write_failures: self.write_failures(),
            evictions: self.evictions(),
            hit_ratio: self.hit_ratio(),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
