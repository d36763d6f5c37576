//! Enabled-clip preferences

use std::collections::BTreeSet;

use emastore::KvStore;
use tracing::warn;

use crate::catalog::Catalog;

/// Storage key of the enabled clip list
pub const AUDIO_SETTINGS_KEY: &str = "audio_settings";

/// Names of enabled audio clips
pub type ClipSet = BTreeSet<String>;

/// Apply a checkbox change to `current`.
///
/// The set never becomes empty: unchecking the last member leaves it in.
pub fn toggle(current: &ClipSet, name: &str, enabled: bool) -> ClipSet {
    let mut next = current.clone();
    if enabled {
        next.insert(name.to_string());
    } else {
        next.remove(name);
    }

    if next.is_empty() {
        next.insert(name.to_string());
    }
    next
}

/// Persisted set of clips eligible for random selection.
///
/// Stored as a JSON array of names. Anything missing, malformed or empty
/// reads as "every clip enabled".
#[derive(Debug, Clone)]
pub struct AudioPreferences {
    store: KvStore,
    defaults: ClipSet,
}

impl AudioPreferences {
    /// Preferences whose default is every clip in `catalog`
    pub fn new(store: KvStore, catalog: &Catalog) -> Self {
        Self {
            store,
            defaults: catalog.clip_names(),
        }
    }

    /// Every clip enabled
    pub fn defaults(&self) -> &ClipSet {
        &self.defaults
    }

    /// Enabled clips
    pub fn read(&self) -> ClipSet {
        let Some(raw) = self.store.get(AUDIO_SETTINGS_KEY) else {
            return self.defaults.clone();
        };

        let names: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "audio settings unreadable, enabling every clip");
                return self.defaults.clone();
            }
        };

        let set: ClipSet = names
            .into_iter()
            .filter_map(|name| name.as_str().map(str::to_string))
            .collect();

        if set.is_empty() {
            return self.defaults.clone();
        }
        set
    }

    /// Persist the enabled set; failures are logged and dropped
    pub fn write(&self, set: &ClipSet) {
        match serde_json::to_string(set) {
            Ok(raw) => {
                // KvStore already logs the failure.
                let _ = self.store.set(AUDIO_SETTINGS_KEY, &raw);
            }
            Err(e) => warn!(error = %e, "audio settings not serialized"),
        }
    }

    /// Enable or disable one clip, keeping at least one enabled
    pub fn set_enabled(&self, name: &str, enabled: bool) -> ClipSet {
        let next = toggle(&self.read(), name, enabled);
        self.write(&next);
        next
    }

    /// Enable every clip again
    pub fn reset(&self) -> ClipSet {
        self.write(&self.defaults);
        self.defaults.clone()
    }
}
