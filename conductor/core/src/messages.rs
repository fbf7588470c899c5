//! Game Messages
//!
//! Messages sent from the Conductor to the presentation layer. The
//! presentation layer is a pure renderer: it draws what these messages tell
//! it and never mutates round state itself.
//!
//! # Design Philosophy
//!
//! Every phase transition is followed by a [`GameMessage::State`] snapshot,
//! so a surface that only renders snapshots stays correct. The more
//! specific messages (`RoundPresented`, `Tick`, `AnswerRevealed`) exist so
//! surfaces can animate without diffing snapshots.

use serde::{Deserialize, Serialize};

use crate::round::{RoundSnapshot, Verdict};
use crate::session::{SessionConfig, SessionResult};

/// Messages from Conductor to the presentation layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GameMessage {
    // ============================================
    // Session Lifecycle
    // ============================================
    /// The pool is built and the first round is loading
    SessionStarted {
        /// Session identifier
        session_id: SessionId,
        /// The validated config
        config: SessionConfig,
        /// Number of eligible entities
        pool_size: usize,
    },

    /// Read-only view of the round state after a transition
    State {
        /// The snapshot
        snapshot: RoundSnapshot,
    },

    /// The session reached its terminal state
    SessionComplete {
        /// Final report
        result: SessionResult,
    },

    /// Progress was written after the session ended
    ProgressUpdated {
        /// Best score after this session
        high_score: u32,
        /// Whether this session set it
        new_high_score: bool,
        /// Names added to the collection
        newly_unlocked: Vec<String>,
    },

    // ============================================
    // Round Messages
    // ============================================
    /// A silhouette is on screen, answers are not accepted yet
    RoundPresented {
        /// 1-based round number
        round_index: u32,
        /// Total rounds in the session
        round_count: u32,
        /// Artwork to silhouette
        image_url: String,
        /// Names to choose from (empty in free-text mode)
        options: Vec<String>,
    },

    /// Answers are accepted from now on
    GuessingStarted {
        /// Seconds on the clock
        time_limit_secs: u32,
    },

    /// One second elapsed while guessing
    Tick {
        /// Seconds left
        time_remaining: u32,
    },

    /// The answer is revealed
    AnswerRevealed {
        /// How the round was scored
        verdict: Verdict,
    },

    // ============================================
    // Input Feedback
    // ============================================
    /// Player event accepted
    Ack {
        /// The acknowledged event
        event_id: EventId,
    },

    /// Player event refused without changing state
    Rejected {
        /// The refused event
        event_id: EventId,
        /// Why
        reason: String,
    },

    /// Out-of-band notification
    Notify {
        /// Severity
        level: NotifyLevel,
        /// Text to show
        message: String,
    },
}

/// Event identifier (for acks)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Generate a new unique event ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("evt_{count}"))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new unique session ID
    ///
    /// Counter plus timestamp, so two sessions started in the same
    /// millisecond still differ.
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::time::{SystemTime, UNIX_EPOCH};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(format!("session_{timestamp}_{count}"))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}
