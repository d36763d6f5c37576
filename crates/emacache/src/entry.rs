//! Cached media records and their key namespaces

use serde::{Deserialize, Serialize};

/// The two kinds of media the cache holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Images (stored with alt text)
    Image,
    /// Audio clips
    Audio,
}

impl MediaKind {
    /// Every kind, in namespace order
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Audio];

    /// Key prefix owned by this kind
    pub fn prefix(self) -> &'static str {
        match self {
            MediaKind::Image => "image_cache_",
            MediaKind::Audio => "audio_cache_",
        }
    }

    /// Storage key for a source
    pub fn key(self, source: &str) -> String {
        format!("{}{}", self.prefix(), source)
    }

    /// Split a storage key into its kind and source
    pub fn parse_key(key: &str) -> Option<(MediaKind, &str)> {
        Self::ALL
            .into_iter()
            .find_map(|kind| key.strip_prefix(kind.prefix()).map(|source| (kind, source)))
    }
}

/// One previously fetched asset
///
/// Stored as `{"data", "timestamp", "alt"}` (images) or
/// `{"data", "timestamp"}` (audio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMediaEntry {
    /// Source URL the entry was fetched from (the cache key, not serialized)
    #[serde(skip)]
    pub source: String,

    /// Data URI payload
    pub data: String,

    /// Creation time in Unix milliseconds
    pub timestamp: i64,

    /// Accessibility label (images only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Pull the timestamp out of a raw record without requiring the full shape
pub(crate) fn parse_timestamp(raw: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let timestamp = value.get("timestamp")?;
    timestamp
        .as_i64()
        .or_else(|| timestamp.as_f64().map(|ts| ts as i64))
}
