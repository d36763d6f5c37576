//! MediaLoader: turns source references into self-contained data URIs
//!
//! Every load normalizes to a usable source string. A cache hit, a fresh
//! encode and a fallback to the original URL all come back as [`Loaded`],
//! tagged with the path that produced them.

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageError, ImageFormat};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::MediaCache;
use crate::entry::MediaKind;
use crate::fetch::Fetch;

/// Which path produced a loaded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Served from the media cache
    Cached,
    /// Fetched and encoded just now
    Fresh,
    /// Loading failed; the value is the original source reference
    Fallback,
}

/// A usable source string and how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    /// How the value was produced
    pub status: LoadStatus,
    /// Data URI, or the original URL on fallback
    pub value: String,
}

impl Loaded {
    fn cached(value: String) -> Self {
        Self {
            status: LoadStatus::Cached,
            value,
        }
    }

    fn fresh(value: String) -> Self {
        Self {
            status: LoadStatus::Fresh,
            value,
        }
    }

    fn fallback(url: &str) -> Self {
        Self {
            status: LoadStatus::Fallback,
            value: url.to_string(),
        }
    }

    /// True when the value is the original reference
    pub fn is_fallback(&self) -> bool {
        self.status == LoadStatus::Fallback
    }
}

/// Failure that no fallback can paper over
#[derive(Debug, Error)]
pub enum LoadError {
    /// The raster encoding stage cannot run in this runtime
    #[error("raster encoding unavailable: {0}")]
    Raster(String),
}

enum RasterError {
    Decode(ImageError),
    Encode(ImageError),
}

/// Decode at natural size onto an RGBA surface and re-encode losslessly as PNG
fn rasterize(bytes: &[u8]) -> Result<Vec<u8>, RasterError> {
    let decoded = image::load_from_memory(bytes).map_err(RasterError::Decode)?;
    let surface = DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut out = Cursor::new(Vec::new());
    surface
        .write_to(&mut out, ImageFormat::Png)
        .map_err(RasterError::Encode)?;
    Ok(out.into_inner())
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Best-effort MIME type from a URL's extension
fn mime_from_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "ogg" | "oga" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "aac" => "audio/mp4",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

fn audio_mime(content_type: Option<&str>, url: &str) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| mime_from_extension(url).to_string())
}

/// Loads images and audio through the media cache
#[derive(Clone)]
pub struct MediaLoader {
    cache: Arc<MediaCache>,
    fetcher: Arc<dyn Fetch>,
}

impl std::fmt::Debug for MediaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLoader")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl MediaLoader {
    /// Create a loader over a cache and a byte source
    pub fn new(cache: Arc<MediaCache>, fetcher: Arc<dyn Fetch>) -> Self {
        Self { cache, fetcher }
    }

    /// The cache this loader writes through to
    pub fn cache(&self) -> &Arc<MediaCache> {
        &self.cache
    }

    /// Load an image as a PNG data URI.
    ///
    /// Fetch and decode failures resolve to the original URL. Only a
    /// failure of the encoding stage itself is returned as an error.
    pub async fn load_image(&self, url: &str, alt: &str) -> Result<Loaded, LoadError> {
        if let Some(entry) = self.cache.lookup(MediaKind::Image, url) {
            return Ok(Loaded::cached(entry.data));
        }

        let fetched = match self.fetcher.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url, error = %e, "image load failed, using original source");
                return Ok(Loaded::fallback(url));
            }
        };

        let rasterized = tokio::task::spawn_blocking(move || rasterize(&fetched.bytes))
            .await
            .map_err(|e| {
                error!(url, error = %e, "image encode task did not run");
                LoadError::Raster(e.to_string())
            })?;

        let png = match rasterized {
            Ok(png) => png,
            Err(RasterError::Decode(e)) => {
                warn!(url, error = %e, "image decode failed, using original source");
                return Ok(Loaded::fallback(url));
            }
            Err(RasterError::Encode(e)) => {
                error!(url, error = %e, "png encoder rejected raster");
                return Err(LoadError::Raster(e.to_string()));
            }
        };

        let uri = data_uri("image/png", &png);
        self.write_through(MediaKind::Image, url, &uri, Some(alt));
        Ok(Loaded::fresh(uri))
    }

    /// Load an audio clip as a data URI; any failure resolves to the original URL
    pub async fn load_audio(&self, url: &str) -> Loaded {
        if let Some(entry) = self.cache.lookup(MediaKind::Audio, url) {
            return Loaded::cached(entry.data);
        }

        match self.fetcher.fetch(url).await {
            Ok(fetched) => {
                let mime = audio_mime(fetched.content_type.as_deref(), url);
                let uri = data_uri(&mime, &fetched.bytes);
                self.write_through(MediaKind::Audio, url, &uri, None);
                Loaded::fresh(uri)
            }
            Err(e) => {
                warn!(url, error = %e, "audio load failed, using original source");
                Loaded::fallback(url)
            }
        }
    }

    /// Cache a payload, recovering from quota exhaustion.
    ///
    /// On a quota failure the oldest share of the cache is evicted and the
    /// write retried; small payloads get one more attempt after that.
    /// Failures never propagate.
    fn write_through(&self, kind: MediaKind, url: &str, payload: &str, alt: Option<&str>) {
        let err = match self.cache.store(kind, url, payload, alt) {
            Ok(()) => return,
            Err(e) => e,
        };

        if !err.is_quota_exceeded() {
            warn!(url, error = %err, "caching failed");
            return;
        }

        let removed = self
            .cache
            .evict_oldest_fraction(self.cache.config().evict_fraction);
        debug!(url, removed, "retrying cache write after eviction");

        match self.cache.store(kind, url, payload, alt) {
            Ok(()) => {
                info!(url, "cached after evicting old entries");
                return;
            }
            Err(e) => warn!(url, error = %e, "cache write failed after eviction"),
        }

        if payload.len() < self.cache.config().small_payload_chars {
            if let Err(e) = self.cache.store(kind, url, payload, alt) {
                warn!(url, error = %e, "final cache attempt failed");
            }
        } else {
            debug!(url, size = payload.len(), "payload too large for a final attempt");
        }
    }
}
