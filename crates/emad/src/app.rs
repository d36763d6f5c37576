//! Command handler for the driver

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use emacache::{
    cached_audio_sources, AudioPreferences, CacheConfig, Catalog, ClickCounter, ImageEntry,
    Interaction, MediaCache, MediaKind, MediaLoader, PressEvent, Preloader, RemoteCounter,
    SourceFetcher, SystemClock, REMOTE_UNAVAILABLE,
};
use emastore::{FileBackend, KvStore};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

/// Open the file-backed store, or continue without persistence
pub fn open_store(dir: &Path, quota: usize) -> KvStore {
    match FileBackend::open_with_quota(dir, quota) {
        Ok(backend) => KvStore::new(backend),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "storage unavailable, nothing will persist");
            KvStore::disabled()
        }
    }
}

pub struct App {
    store: KvStore,
    catalog: Catalog,
    cache: Arc<MediaCache>,
    loader: MediaLoader,
    remote: RemoteCounter,
}

impl App {
    pub fn new(
        store: KvStore,
        catalog: Catalog,
        assets: &Path,
        config: CacheConfig,
        remote: RemoteCounter,
    ) -> Self {
        let cache = Arc::new(MediaCache::with_clock(
            store.clone(),
            Arc::new(SystemClock),
            config,
        ));
        let loader = MediaLoader::new(cache.clone(), Arc::new(SourceFetcher::new(assets)));

        Self {
            store,
            catalog,
            cache,
            loader,
            remote,
        }
    }

    fn preferences(&self) -> AudioPreferences {
        AudioPreferences::new(self.store.clone(), &self.catalog)
    }

    /// Entry shown on launch, picked at random
    fn launch_entry<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ImageEntry> {
        self.catalog.images.choose(rng)
    }

    pub async fn preload<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let preloader = Preloader::new(self.loader.clone());

        // The launch entry is settled before the rest.
        if let Some(entry) = self.launch_entry(rng) {
            preloader.preload_selected(entry).await;
        }
        let report = preloader.preload_all(&self.catalog).await;

        let mut lines = vec![format!("preload: {}", report.summary())];
        for outcome in &report.images {
            match &outcome.result {
                Ok(loaded) if loaded.is_fallback() => {
                    lines.push(format!("  fallback  {}", outcome.url))
                }
                Err(e) => lines.push(format!("  failed    {} ({})", outcome.url, e)),
                Ok(_) => {}
            }
        }
        lines.join("\n")
    }

    /// One full gesture: press, trigger, release
    pub async fn click<R: Rng + ?Sized>(&self, remote: bool, rng: &mut R) -> String {
        let enabled = self.preferences().read();
        let mut interaction = Interaction::new(
            self.catalog.clone(),
            cached_audio_sources(&self.cache, &self.catalog),
            ClickCounter::new(self.store.clone()),
        );

        let (_, triggered) = interaction.handle(PressEvent::Press, &enabled, rng);
        interaction.handle(PressEvent::Release, &enabled, rng);

        let Some(triggered) = triggered else {
            return "no clip to play".to_string();
        };

        let origin = if triggered.source.starts_with("data:") {
            "cached"
        } else {
            "original"
        };
        let mut line = format!(
            "played {} from {} at {}ms, count {}",
            triggered.clip.name,
            origin,
            triggered.clip.offset_ms,
            triggered.count
        );

        if remote {
            let confirmed = self.remote.increment().await;
            line.push_str(if confirmed {
                ", remote updated"
            } else {
                ", remote not updated"
            });
        }
        line
    }

    pub async fn count(&self, remote: bool) -> String {
        if !remote {
            return ClickCounter::new(self.store.clone()).read().to_string();
        }

        match self.remote.current().await {
            REMOTE_UNAVAILABLE => "remote count unavailable".to_string(),
            count => count.to_string(),
        }
    }

    pub fn settings_list(&self) -> String {
        let enabled = self.preferences().read();
        self.catalog
            .audio
            .iter()
            .map(|clip| {
                let mark = if enabled.contains(&clip.name) { "x" } else { " " };
                format!("[{}] {}", mark, clip.name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn settings_set(&self, name: &str, enabled: bool) -> Result<String> {
        if self.catalog.clip(name).is_none() {
            bail!("unknown clip '{}'", name);
        }

        let set = self.preferences().set_enabled(name, enabled);
        if !enabled && set.contains(name) {
            return Ok(format!("{} stays enabled: at least one clip must be", name));
        }
        Ok(self.settings_list())
    }

    pub fn settings_reset(&self) -> String {
        self.preferences().reset();
        self.settings_list()
    }

    pub fn cache_stats(&self) -> Result<String> {
        let stats = serde_json::json!({
            "images": self.cache.sources(MediaKind::Image).len(),
            "audio": self.cache.sources(MediaKind::Audio).len(),
            "keys": self.store.key_count(),
            "config": self.cache.config(),
        });
        Ok(serde_json::to_string_pretty(&stats)?)
    }

    pub fn cache_clean(&self, fraction: f64, expired: bool) -> Result<String> {
        if expired {
            let removed = self.cache.purge_expired();
            return Ok(format!("removed {} expired entries", removed));
        }

        if !(0.0..=1.0).contains(&fraction) {
            bail!("fraction must be between 0 and 1, got {}", fraction);
        }
        let removed = self.cache.evict_oldest_fraction(fraction);
        Ok(format!("removed {} oldest entries", removed))
    }

    pub fn cache_clear(&self) -> String {
        format!("removed {} entries", self.cache.clear())
    }

    pub fn cache_show(&self, url: &str) -> String {
        let found = MediaKind::ALL
            .into_iter()
            .find_map(|kind| self.cache.lookup(kind, url).map(|entry| (kind, entry)));

        let Some((kind, entry)) = found else {
            return format!("{} is not cached", url);
        };

        let stored = chrono::DateTime::from_timestamp_millis(entry.timestamp)
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| entry.timestamp.to_string());
        let mut line = format!(
            "{:?} {}\n  stored {}\n  {} chars",
            kind,
            url,
            stored,
            entry.data.len()
        );
        if let Some(alt) = entry.alt {
            line.push_str(&format!("\n  alt {:?}", alt));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn app(store: KvStore, assets: &TempDir) -> App {
        App::new(
            store,
            Catalog::builtin(),
            assets.path(),
            CacheConfig::default(),
            RemoteCounter::new("http://127.0.0.1:9/add", "http://127.0.0.1:9/fetch"),
        )
    }

    #[test]
    fn test_unopenable_data_dir_falls_back() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let store = open_store(&file, 1000);
        assert!(store.set("k", "v").is_err());
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test]
    async fn test_click_counts_and_persists() {
        let dir = TempDir::new().unwrap();
        let assets = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        {
            let app = app(open_store(dir.path(), 10_000), &assets);
            assert!(app.click(false, &mut rng).await.ends_with("count 1"));
            assert!(app.click(false, &mut rng).await.ends_with("count 2"));
        }

        let app = app(open_store(dir.path(), 10_000), &assets);
        assert_eq!(app.count(false).await, "2");
    }

    #[tokio::test]
    async fn test_click_plays_cached_clip() {
        let assets = TempDir::new().unwrap();
        let app = app(KvStore::memory(), &assets);
        app.settings_set("Hiro酱", false).unwrap();
        app.cache
            .store(MediaKind::Audio, "ogg/ema.ogg", "data:audio/ogg;base64,AA==", None)
            .unwrap();

        let line = app.click(false, &mut StdRng::seed_from_u64(0)).await;
        assert_eq!(line, "played Kya from cached at 50ms, count 1");
    }

    #[test]
    fn test_settings_keep_one_enabled() {
        let assets = TempDir::new().unwrap();
        let app = app(KvStore::memory(), &assets);

        assert_eq!(app.settings_list(), "[x] Kya\n[x] Hiro酱");
        assert_eq!(app.settings_set("Kya", false).unwrap(), "[ ] Kya\n[x] Hiro酱");
        assert_eq!(
            app.settings_set("Hiro酱", false).unwrap(),
            "Hiro酱 stays enabled: at least one clip must be"
        );
        assert!(app.settings_set("Woof", true).is_err());
        assert_eq!(app.settings_reset(), "[x] Kya\n[x] Hiro酱");
    }

    #[test]
    fn test_cache_commands() {
        let assets = TempDir::new().unwrap();
        let app = app(KvStore::memory(), &assets);
        for i in 0..4 {
            app.cache
                .store(MediaKind::Image, &format!("https://cdn/{}.png", i), "data:,", Some("a"))
                .unwrap();
        }

        assert!(app.cache_show("https://cdn/0.png").contains("alt \"a\""));
        assert_eq!(app.cache_show("https://cdn/9.png"), "https://cdn/9.png is not cached");
        assert!(app.cache_clean(1.5, false).is_err());
        assert_eq!(app.cache_clean(0.5, false).unwrap(), "removed 2 oldest entries");
        assert_eq!(app.cache_clean(0.5, true).unwrap(), "removed 0 expired entries");
        assert_eq!(app.cache_clear(), "removed 2 entries");

        let stats: serde_json::Value = serde_json::from_str(&app.cache_stats().unwrap()).unwrap();
        assert_eq!(stats["images"], 0);
    }

    #[test]
    fn test_launch_entry_is_random() {
        let assets = TempDir::new().unwrap();
        let app = app(KvStore::memory(), &assets);

        let picked: std::collections::BTreeSet<u32> = (0..64)
            .filter_map(|seed| app.launch_entry(&mut StdRng::seed_from_u64(seed)))
            .map(|entry| entry.id)
            .collect();

        assert_eq!(picked, [1, 2, 3].into_iter().collect());
    }
}
