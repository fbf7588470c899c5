//! Player Events
//!
//! Intents sent from the presentation layer to the Conductor. Each carries
//! an [`EventId`] so the Conductor can acknowledge or reject it.

use serde::{Deserialize, Serialize};

use crate::messages::EventId;

/// Events from the presentation layer to the Conductor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// Player picked an option (0-based index into the round's options)
    ChoiceSelected {
        /// Event ID for acknowledgment
        event_id: EventId,
        /// Option index
        index: usize,
    },

    /// Player typed an answer
    TextSubmitted {
        /// Event ID for acknowledgment
        event_id: EventId,
        /// Raw text as typed
        text: String,
    },

    /// Player left the session
    QuitRequested {
        /// Event ID for acknowledgment
        event_id: EventId,
    },
}

impl PlayerEvent {
    /// Pick option `index` (0-based)
    pub fn choice(index: usize) -> Self {
        Self::ChoiceSelected {
            event_id: EventId::new(),
            index,
        }
    }

    /// Submit a typed name
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextSubmitted {
            event_id: EventId::new(),
            text: text.into(),
        }
    }

    /// Leave the session
    pub fn quit() -> Self {
        Self::QuitRequested {
            event_id: EventId::new(),
        }
    }

    /// Get the event ID
    #[must_use]
    pub fn event_id(&self) -> &EventId {
        match self {
            Self::ChoiceSelected { event_id, .. }
            | Self::TextSubmitted { event_id, .. }
            | Self::QuitRequested { event_id } => event_id,
        }
    }
}
