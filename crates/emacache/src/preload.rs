//! Bulk warm-up of the media cache

use std::fmt;

use ahash::AHashMap;
use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::MediaCache;
use crate::catalog::{Catalog, ImageEntry};
use crate::entry::MediaKind;
use crate::loader::{LoadError, LoadStatus, Loaded, MediaLoader};

/// One image URL to warm, with its label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
    /// Image URL
    pub url: String,
    /// Label stored alongside the cached image
    pub alt: String,
}

/// Every image URL the catalog can display.
///
/// Default states come first per entry; pressed states are listed only when
/// they differ from the default.
pub fn image_targets(catalog: &Catalog) -> Vec<ImageTarget> {
    let mut targets = Vec::with_capacity(catalog.images.len() * 2);
    for entry in &catalog.images {
        targets.push(ImageTarget {
            url: entry.default_url().to_string(),
            alt: entry.default_alt().to_string(),
        });
        if entry.has_distinct_pressed() {
            targets.push(ImageTarget {
                url: entry.pressed_url().to_string(),
                alt: entry.pressed_alt().to_string(),
            });
        }
    }
    targets
}

/// Clip sources already in the cache, without fetching anything.
///
/// Clips that are not cached are left out; callers play the original.
pub fn cached_audio_sources(cache: &MediaCache, catalog: &Catalog) -> AHashMap<String, String> {
    catalog
        .audio
        .iter()
        .filter_map(|clip| {
            let entry = cache.lookup(MediaKind::Audio, &clip.src)?;
            Some((clip.src.clone(), entry.data))
        })
        .collect()
}

/// Result of one image preload
#[derive(Debug)]
pub struct ImageOutcome {
    /// Image URL
    pub url: String,
    /// Loaded value, or the encoding failure
    pub result: Result<Loaded, LoadError>,
}

/// Counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    /// Already cached
    pub cached: usize,
    /// Fetched and cached now
    pub fresh: usize,
    /// Left pointing at the original source
    pub fallback: usize,
    /// Rejected outright
    pub failed: usize,
}

impl PreloadSummary {
    fn record(&mut self, status: LoadStatus) {
        match status {
            LoadStatus::Cached => self.cached += 1,
            LoadStatus::Fresh => self.fresh += 1,
            LoadStatus::Fallback => self.fallback += 1,
        }
    }

    /// Total number of loads
    pub fn total(&self) -> usize {
        self.cached + self.fresh + self.fallback + self.failed
    }
}

impl fmt::Display for PreloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loaded ({} cached, {} fresh, {} fallback, {} failed)",
            self.total(),
            self.cached,
            self.fresh,
            self.fallback,
            self.failed
        )
    }
}

/// Everything a full preload settled to
#[derive(Debug, Default)]
pub struct PreloadReport {
    /// Per-image outcomes, in target order
    pub images: Vec<ImageOutcome>,
    /// Original audio source to playable source
    pub audio_sources: AHashMap<String, String>,
    audio_statuses: Vec<LoadStatus>,
}

impl PreloadReport {
    /// Playable source for an audio clip; the original when it was never loaded
    pub fn resolve_audio<'a>(&'a self, src: &'a str) -> &'a str {
        self.audio_sources
            .get(src)
            .map(String::as_str)
            .unwrap_or(src)
    }

    /// Outcome counts over images and audio
    pub fn summary(&self) -> PreloadSummary {
        let mut summary = PreloadSummary::default();
        for outcome in &self.images {
            match &outcome.result {
                Ok(loaded) => summary.record(loaded.status),
                Err(_) => summary.failed += 1,
            }
        }
        for status in &self.audio_statuses {
            summary.record(*status);
        }
        summary
    }
}

/// Both states of the displayed entry
#[derive(Debug)]
pub struct SelectedImage {
    /// Default state
    pub default: Result<Loaded, LoadError>,
    /// Pressed state, when distinct from the default
    pub pressed: Option<Result<Loaded, LoadError>>,
}

/// Warms the cache for a catalog
#[derive(Debug, Clone)]
pub struct Preloader {
    loader: MediaLoader,
}

impl Preloader {
    /// Preloader over a loader
    pub fn new(loader: MediaLoader) -> Self {
        Self { loader }
    }

    /// The underlying loader
    pub fn loader(&self) -> &MediaLoader {
        &self.loader
    }

    /// Load every image and every clip concurrently and wait for all of them.
    ///
    /// Individual failures never abort the batch.
    pub async fn preload_all(&self, catalog: &Catalog) -> PreloadReport {
        let targets = image_targets(catalog);

        let image_loads = join_all(targets.iter().map(|target| async move {
            let result = self.loader.load_image(&target.url, &target.alt).await;
            ImageOutcome {
                url: target.url.clone(),
                result,
            }
        }));
        let audio_loads = join_all(catalog.audio.iter().map(|clip| async move {
            let loaded = self.loader.load_audio(&clip.src).await;
            (clip.src.clone(), loaded)
        }));

        let (images, audio) = futures::join!(image_loads, audio_loads);

        for outcome in &images {
            if let Err(e) = &outcome.result {
                warn!(url = %outcome.url, error = %e, "image preload rejected");
            }
        }

        let mut report = PreloadReport {
            images,
            ..Default::default()
        };
        for (src, loaded) in audio {
            report.audio_statuses.push(loaded.status);
            report.audio_sources.insert(src, loaded.value);
        }

        info!(summary = %report.summary(), "preload finished");
        report
    }

    /// Load the default state of `entry`, then its pressed state.
    ///
    /// The pressed load starts only after the default has settled.
    pub async fn preload_selected(&self, entry: &ImageEntry) -> SelectedImage {
        let default = self
            .loader
            .load_image(entry.default_url(), entry.default_alt())
            .await;

        let pressed = if entry.has_distinct_pressed() {
            Some(
                self.loader
                    .load_image(entry.pressed_url(), entry.pressed_alt())
                    .await,
            )
        } else {
            None
        };

        SelectedImage { default, pressed }
    }
}
