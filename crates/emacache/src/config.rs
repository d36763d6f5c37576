//! Cache tunables

use serde::{Deserialize, Serialize};

/// Expiry and quota-recovery settings for the media cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are never returned
    pub expiry_secs: u64,

    /// Payloads shorter than this get one last write attempt under quota pressure
    pub small_payload_chars: usize,

    /// Share of cache entries dropped when a write hits the quota
    pub evict_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_secs: 24 * 60 * 60,
            small_payload_chars: 100_000,
            evict_fraction: 0.5,
        }
    }
}

impl CacheConfig {
    /// Expiry window in milliseconds
    pub fn expiry_millis(&self) -> i64 {
        (self.expiry_secs as i64).saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"expiry_secs": 60}"#).unwrap();

        assert_eq!(config.expiry_millis(), 60_000);
        assert_eq!(config.small_payload_chars, 100_000);
        assert_eq!(config.evict_fraction, 0.5);
    }
}
