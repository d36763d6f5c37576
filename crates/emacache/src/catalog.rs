//! Static asset catalog: mascot images, audio clips and artist credits

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to load a catalog file
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File could not be read
    #[error("catalog read failed: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid catalog
    #[error("catalog is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog lists no audio clips
    #[error("catalog has no audio clips")]
    NoAudio,
}

/// One visual state of a two-state image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageState {
    /// Image URL
    pub src: String,
    /// Accessibility label
    pub alt: String,
}

/// Default and pressed variants of an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePair {
    /// Shown while idle
    pub default: ImageState,
    /// Shown while held down
    pub pressed: ImageState,
}

/// Where an image entry's pixels come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageArt {
    /// Same picture in every state
    Single {
        /// Image URL
        url: String,
    },
    /// Separate pictures for idle and pressed
    States {
        /// The two states
        states: StatePair,
    },
}

/// A mascot image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Stable identifier
    pub id: u32,
    /// Entry-level label (used by single-state entries)
    pub alt: String,
    /// Image source(s)
    #[serde(flatten)]
    pub art: ImageArt,
}

impl ImageEntry {
    /// Single-state entry
    pub fn single(id: u32, url: &str, alt: &str) -> Self {
        Self {
            id,
            alt: alt.to_string(),
            art: ImageArt::Single {
                url: url.to_string(),
            },
        }
    }

    /// Two-state entry
    pub fn two_state(id: u32, default: (&str, &str), pressed: (&str, &str), alt: &str) -> Self {
        Self {
            id,
            alt: alt.to_string(),
            art: ImageArt::States {
                states: StatePair {
                    default: ImageState {
                        src: default.0.to_string(),
                        alt: default.1.to_string(),
                    },
                    pressed: ImageState {
                        src: pressed.0.to_string(),
                        alt: pressed.1.to_string(),
                    },
                },
            },
        }
    }

    /// URL shown while idle
    pub fn default_url(&self) -> &str {
        match &self.art {
            ImageArt::Single { url } => url,
            ImageArt::States { states } => &states.default.src,
        }
    }

    /// URL shown while pressed (the default URL for single-state entries)
    pub fn pressed_url(&self) -> &str {
        match &self.art {
            ImageArt::Single { url } => url,
            ImageArt::States { states } => &states.pressed.src,
        }
    }

    /// Label shown while idle
    pub fn default_alt(&self) -> &str {
        match &self.art {
            ImageArt::Single { .. } => &self.alt,
            ImageArt::States { states } => &states.default.alt,
        }
    }

    /// Label shown while pressed
    pub fn pressed_alt(&self) -> &str {
        match &self.art {
            ImageArt::Single { .. } => &self.alt,
            ImageArt::States { states } => &states.pressed.alt,
        }
    }

    /// True when pressing swaps to a different picture
    pub fn has_distinct_pressed(&self) -> bool {
        self.pressed_url() != self.default_url()
    }
}

/// A sound that can play on press
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Source URL or bundled asset path
    pub src: String,
    /// Playback start offset in milliseconds
    #[serde(default)]
    pub offset_ms: u64,
    /// Display name, also the preference identifier
    pub name: String,
}

impl AudioClip {
    /// Playback start offset
    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.offset_ms)
    }
}

/// Credit for an illustrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Stable identifier
    pub id: u32,
    /// Display name
    pub name: String,
    /// Profile link
    pub url: String,
}

/// Everything the toy ships with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Mascot images
    pub images: Vec<ImageEntry>,
    /// Press sounds
    pub audio: Vec<AudioClip>,
    /// Illustrator credits
    #[serde(default)]
    pub artists: Vec<Artist>,
}

impl Catalog {
    /// Built-in tables
    pub fn builtin() -> Self {
        Self {
            images: vec![
                ImageEntry::two_state(
                    1,
                    ("https://cdn.sa.net/2025/11/01/eNaMW9Qy5EsHAdK.png", ">_<"),
                    ("https://cdn.sa.net/2025/11/01/k27uKp9taAUJrN8.png", ">U<"),
                    ">U<",
                ),
                ImageEntry::two_state(
                    2,
                    ("https://cdn.sa.net/2025/11/01/WkOA7pxLV9d81HY.png", "O^O"),
                    ("https://cdn.sa.net/2025/11/01/hSYlGCkQBFoXL6g.png", "O^O"),
                    "O^O",
                ),
                ImageEntry::single(3, "https://cdn.sa.net/2025/11/01/EeAl94KrsCNPGtZ.png", "doro"),
            ],
            audio: vec![
                AudioClip {
                    src: "ogg/ema.ogg".to_string(),
                    offset_ms: 50,
                    name: "Kya".to_string(),
                },
                AudioClip {
                    src: "ogg/ema2hiro.mp3".to_string(),
                    offset_ms: 0,
                    name: "Hiro酱".to_string(),
                },
            ],
            artists: Vec::new(),
        }
    }

    /// Parse a catalog from JSON
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        if catalog.audio.is_empty() {
            return Err(CatalogError::NoAudio);
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Names of every audio clip
    pub fn clip_names(&self) -> BTreeSet<String> {
        self.audio.iter().map(|clip| clip.name.clone()).collect()
    }

    /// Clip by name
    pub fn clip(&self, name: &str) -> Option<&AudioClip> {
        self.audio.iter().find(|clip| clip.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_helpers() {
        let catalog = Catalog::builtin();

        let two_state = &catalog.images[0];
        assert_eq!(two_state.default_alt(), ">_<");
        assert_eq!(two_state.pressed_alt(), ">U<");
        assert!(two_state.has_distinct_pressed());

        let single = &catalog.images[2];
        assert_eq!(single.pressed_url(), single.default_url());
        assert_eq!(single.pressed_alt(), "doro");
        assert!(!single.has_distinct_pressed());
    }

    #[test]
    fn test_parse_json_catalog() {
        let json = r#"{
            "images": [
                {"id": 1, "alt": "doro", "url": "https://a/doro.png"},
                {"id": 2, "alt": "O^O", "states": {
                    "default": {"src": "https://a/d.png", "alt": "O^O"},
                    "pressed": {"src": "https://a/p.png", "alt": "O^O!"}
                }}
            ],
            "audio": [{"src": "ogg/ema.ogg", "offset_ms": 50, "name": "Kya"}],
            "artists": [{"id": 1, "name": "someone", "url": "https://example.com"}]
        }"#;

        let catalog = Catalog::from_json_str(json).unwrap();
        assert_eq!(catalog.images[0].default_url(), "https://a/doro.png");
        assert_eq!(catalog.images[1].pressed_alt(), "O^O!");
        assert_eq!(catalog.audio[0].offset(), Duration::from_millis(50));
        assert_eq!(catalog.artists.len(), 1);
    }

    #[test]
    fn test_catalog_without_audio_is_rejected() {
        let json = r#"{"images": [], "audio": []}"#;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(CatalogError::NoAudio)
        ));
    }

    #[test]
    fn test_builtin_round_trips_through_json() {
        let catalog = Catalog::builtin();
        let json = serde_json::to_string(&catalog).unwrap();

        assert_eq!(Catalog::from_json_str(&json).unwrap(), catalog);
    }

    #[test]
    fn test_clip_names() {
        let names = Catalog::builtin().clip_names();
        assert!(names.contains("Kya"));
        assert!(names.contains("Hiro酱"));
        assert_eq!(names.len(), 2);
    }
}
