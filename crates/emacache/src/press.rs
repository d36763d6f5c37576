//! Press gesture state machine
//!
//! ```text
//! Idle    --Press-------------> Pressed(false)   Trigger
//! Pressed --Release | Cancel--> Idle             Reset
//! Pressed(false) --LongPressElapsed--> Pressed(true)   LongHeld
//! ```
//!
//! Every other pair leaves the state alone, so a gesture triggers at most
//! once however many press events arrive before release.

use std::time::Duration;

use ahash::AHashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::catalog::{AudioClip, Catalog};
use crate::counter::ClickCounter;
use crate::prefs::ClipSet;

/// Hold time before the long-press variant shows
pub const LONG_PRESS_DELAY: Duration = Duration::from_millis(1500);

/// Where a gesture stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressState {
    /// Not held
    #[default]
    Idle,
    /// Held; `long_held` once the long-press delay has passed
    Pressed {
        /// Long-press variant is showing
        long_held: bool,
    },
}

/// Pointer and timer inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEvent {
    /// Pointer or touch went down
    Press,
    /// Pointer or touch went up
    Release,
    /// Pointer left or the touch was cancelled
    Cancel,
    /// The long-press timer fired
    LongPressElapsed,
}

/// What the caller should do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEffect {
    /// Play one clip and count one click
    Trigger,
    /// Show the long-press variant
    LongHeld,
    /// Drop the pressed visuals and cancel the timer
    Reset,
    /// Nothing
    None,
}

impl PressState {
    /// Apply an event
    pub fn on(self, event: PressEvent) -> (PressState, PressEffect) {
        use PressEffect as E;
        use PressEvent as Ev;
        use PressState as S;

        match (self, event) {
            (S::Idle, Ev::Press) => (S::Pressed { long_held: false }, E::Trigger),
            (S::Pressed { .. }, Ev::Release | Ev::Cancel) => (S::Idle, E::Reset),
            (S::Pressed { long_held: false }, Ev::LongPressElapsed) => {
                (S::Pressed { long_held: true }, E::LongHeld)
            }
            (state, _) => (state, E::None),
        }
    }

    /// Held down
    pub fn is_pressed(self) -> bool {
        matches!(self, PressState::Pressed { .. })
    }

    /// Held past the long-press delay
    pub fn is_long_held(self) -> bool {
        matches!(self, PressState::Pressed { long_held: true })
    }
}

/// Pick an enabled clip at random, or the first clip when none is enabled
pub fn choose_clip<'a, R: Rng + ?Sized>(
    catalog: &'a Catalog,
    enabled: &ClipSet,
    rng: &mut R,
) -> Option<&'a AudioClip> {
    let candidates: Vec<&AudioClip> = catalog
        .audio
        .iter()
        .filter(|clip| enabled.contains(&clip.name))
        .collect();

    candidates
        .choose(rng)
        .copied()
        .or_else(|| catalog.audio.first())
}

/// Result of a triggering press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggered {
    /// Clip to play
    pub clip: AudioClip,
    /// Playable source for the clip (data URI or original reference)
    pub source: String,
    /// Click count after this press
    pub count: u64,
}

/// Drives the state machine against the counter and the resolved clip sources
#[derive(Debug)]
pub struct Interaction {
    state: PressState,
    catalog: Catalog,
    sources: AHashMap<String, String>,
    counter: ClickCounter,
}

impl Interaction {
    /// Interaction over a catalog; `sources` maps clip src to a resolved source
    pub fn new(catalog: Catalog, sources: AHashMap<String, String>, counter: ClickCounter) -> Self {
        Self {
            state: PressState::Idle,
            catalog,
            sources,
            counter,
        }
    }

    /// Current gesture state
    pub fn state(&self) -> PressState {
        self.state
    }

    /// Feed one event. Returns the clip and new count when the event triggers.
    pub fn handle<R: Rng + ?Sized>(
        &mut self,
        event: PressEvent,
        enabled: &ClipSet,
        rng: &mut R,
    ) -> (PressEffect, Option<Triggered>) {
        let (next, effect) = self.state.on(event);
        self.state = next;

        if effect != PressEffect::Trigger {
            return (effect, None);
        }

        let Some(clip) = choose_clip(&self.catalog, enabled, rng).cloned() else {
            return (effect, None);
        };
        let source = self
            .sources
            .get(&clip.src)
            .cloned()
            .unwrap_or_else(|| clip.src.clone());
        let count = self.counter.increment();
        debug!(clip = %clip.name, count, "press triggered");

        (
            effect,
            Some(Triggered {
                clip,
                source,
                count,
            }),
        )
    }
}
