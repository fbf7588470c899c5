//! Effects port
//!
//! The core never plays audio itself. It emits [`Cue`]s through an injected
//! [`Effects`] implementation and the front-end decides what they sound like.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Effect events emitted by the Conductor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    /// A silhouette appeared
    Presented,
    /// Right answer
    Correct,
    /// Wrong answer or timeout
    Wrong,
    /// The session reached its terminal state
    SessionEnded,
}

/// Sink for effect cues
pub trait Effects: Send + Sync {
    /// Play a cue; must not block
    fn play(&self, cue: Cue);
}

/// Silent effects
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEffects;

impl Effects for NoEffects {
    fn play(&self, _cue: Cue) {}
}

/// Effects that remember every cue (for tests and replays)
#[derive(Clone, Debug, Default)]
pub struct RecordingEffects {
    played: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingEffects {
    /// Empty recording
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues played so far, in order
    #[must_use]
    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().clone()
    }
}

impl Effects for RecordingEffects {
    fn play(&self, cue: Cue) {
        self.played.lock().push(cue);
    }
}
