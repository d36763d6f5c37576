//! # emacache
//!
//! Media caching and persisted toy state for EmaPuppy.
//!
//! ## Architecture
//! - **MediaCache**: timestamped data-URI records in an `emastore::KvStore`,
//!   expired on lookup and evicted oldest-first under quota pressure
//! - **MediaLoader**: fetch, rasterize and encode, with write-through caching
//!   and fallback to the original source
//! - **Preloader**: concurrent warm-up of every catalog asset
//! - **ClickCounter / AudioPreferences / RemoteCounter**: small persisted
//!   state and the shared counter API
//! - **Press state machine**: one trigger per gesture, long-press variant

#![warn(missing_docs)]

mod cache;
mod catalog;
mod clock;
mod config;
mod counter;
mod entry;
mod fetch;
mod loader;
mod prefs;
mod preload;
mod press;
mod stats;

pub use cache::MediaCache;
pub use catalog::{
    Artist, AudioClip, Catalog, CatalogError, ImageArt, ImageEntry, ImageState, StatePair,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use counter::{
    ClickCounter, RemoteCounter, CLICK_COUNT_KEY, DEFAULT_INCREMENT_URL, DEFAULT_READ_URL,
    REMOTE_UNAVAILABLE,
};
pub use entry::{CachedMediaEntry, MediaKind};
pub use fetch::{Fetch, FetchError, Fetched, SourceFetcher};
pub use loader::{LoadError, LoadStatus, Loaded, MediaLoader};
pub use prefs::{toggle, AudioPreferences, ClipSet, AUDIO_SETTINGS_KEY};
pub use preload::{
    cached_audio_sources, image_targets, ImageOutcome, ImageTarget, PreloadReport, PreloadSummary,
    Preloader, SelectedImage,
};
pub use press::{
    choose_clip, Interaction, PressEffect, PressEvent, PressState, Triggered, LONG_PRESS_DELAY,
};
pub use stats::{CacheStats, StatsSnapshot};
