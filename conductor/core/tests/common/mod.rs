//! Shared harness for Conductor integration tests
//!
//! A scripted player that answers from a lookup of artwork URL to name, so
//! tests can decide per round whether to answer right, wrong, or not at all.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use whosthat_core::catalog::{CategoryId, InMemoryCatalog};
use whosthat_core::{
    Conductor, ConductorConfig, Cue, GameMessage, PlayerEvent, ProgressStore, RecordingEffects,
    SessionConfig, SessionError, SessionResult,
};

/// What the player does in a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    /// Type the right name as soon as guessing starts
    Correct,
    /// Pick the right option as soon as guessing starts
    CorrectChoice,
    /// Type a wrong name as soon as guessing starts
    Wrong,
    /// Pick an option that isn't the answer
    WrongChoice,
    /// Let the clock run out
    Wait,
    /// Type the right name after `n` ticks
    CorrectAfterTicks(u32),
    /// Answer while the silhouette is still presenting, then answer right
    EarlyThenCorrect,
    /// Pick an option in free-text mode, then answer right
    ChoiceThenCorrect,
    /// Leave the session as soon as guessing starts
    Quit,
}

/// Six starters across two categories
pub fn starter_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_entity(CategoryId(1), 1, "bulbasaur")
        .with_entity(CategoryId(1), 4, "charmander")
        .with_entity(CategoryId(1), 7, "squirtle")
        .with_entity(CategoryId(1), 122, "mr-mime")
        .with_legendary(CategoryId(1), 150, "mewtwo")
        .with_entity(CategoryId(2), 152, "chikorita")
}

/// Artwork URL to answer
pub fn answer_key(catalog: &InMemoryCatalog) -> HashMap<String, String> {
    catalog
        .entities()
        .filter_map(|entity| {
            entity
                .image_url
                .clone()
                .map(|url| (url, entity.name.clone()))
        })
        .collect()
}

/// Default timings with a fixed seed
pub fn seeded_config() -> ConductorConfig {
    ConductorConfig {
        presentation_delay: Duration::from_millis(1500),
        reveal_delay: Duration::from_millis(3000),
        sudden_death_delay: Duration::from_millis(2000),
        tick_interval: Duration::from_secs(1),
        max_selection_attempts: 20,
        seed: Some(7),
    }
}

/// Play `script` against the Conductor
///
/// Runs until the Conductor is dropped and returns every message received.
pub async fn scripted_player(
    key: HashMap<String, String>,
    mut rx: mpsc::Receiver<GameMessage>,
    events: mpsc::Sender<PlayerEvent>,
    script: Vec<Move>,
) -> Vec<GameMessage> {
    let mut received = Vec::new();
    let mut moves = script.into_iter();
    let mut answer = String::new();
    let mut options: Vec<String> = Vec::new();
    let mut current = Move::Wait;
    let mut ticks = 0;

    while let Some(msg) = rx.recv().await {
        match &msg {
            GameMessage::RoundPresented {
                image_url,
                options: offered,
                ..
            } => {
                answer = key.get(image_url).cloned().unwrap_or_default();
                options.clone_from(offered);
                current = moves.next().unwrap_or(Move::Wait);
                if matches!(current, Move::EarlyThenCorrect) {
                    let _ = events.send(PlayerEvent::text(answer.clone())).await;
                }
            }
            GameMessage::GuessingStarted { .. } => {
                ticks = 0;
                let event = match current {
                    Move::Correct | Move::EarlyThenCorrect => {
                        Some(PlayerEvent::text(answer.clone()))
                    }
                    Move::CorrectChoice => options
                        .iter()
                        .position(|option| *option == answer)
                        .map(PlayerEvent::choice),
                    Move::Wrong => Some(PlayerEvent::text("missingno")),
                    Move::WrongChoice => options
                        .iter()
                        .position(|option| *option != answer)
                        .map(PlayerEvent::choice),
                    Move::ChoiceThenCorrect => Some(PlayerEvent::choice(0)),
                    Move::Quit => Some(PlayerEvent::quit()),
                    Move::Wait | Move::CorrectAfterTicks(_) => None,
                };
                if let Some(event) = event {
                    let _ = events.send(event).await;
                }
            }
            GameMessage::Rejected { .. } if current == Move::ChoiceThenCorrect => {
                let _ = events.send(PlayerEvent::text(answer.clone())).await;
            }
            GameMessage::Tick { .. } => {
                ticks += 1;
                if current == Move::CorrectAfterTicks(ticks) {
                    let _ = events.send(PlayerEvent::text(answer.clone())).await;
                }
            }
            _ => {}
        }
        received.push(msg);
    }
    received
}

/// Everything a finished run left behind
pub struct Run {
    pub result: Result<SessionResult, SessionError>,
    pub messages: Vec<GameMessage>,
    pub catalog: Arc<InMemoryCatalog>,
    pub cues: Vec<Cue>,
}

impl Run {
    /// The result, panicking if the session never started
    pub fn finished(&self) -> &SessionResult {
        self.result.as_ref().expect("session should have started")
    }

    /// Messages matching a predicate
    pub fn count(&self, predicate: impl Fn(&GameMessage) -> bool) -> usize {
        self.messages.iter().filter(|msg| predicate(msg)).count()
    }
}

/// Run one session with a scripted player
pub async fn run_session(
    catalog: InMemoryCatalog,
    conductor_config: ConductorConfig,
    config: SessionConfig,
    script: Vec<Move>,
    store: Option<ProgressStore>,
) -> Run {
    let catalog = Arc::new(catalog);
    let key = answer_key(&catalog);
    let effects = RecordingEffects::new();
    let (tx, rx) = mpsc::channel(1024);
    let (events_tx, events_rx) = mpsc::channel(16);

    let mut conductor = Conductor::with_shared_catalog(Arc::clone(&catalog), conductor_config, tx)
        .with_effects(effects.clone());
    if let Some(store) = store {
        conductor = conductor.with_store(store);
    }

    let player = tokio::spawn(scripted_player(key, rx, events_tx, script));
    let result = conductor.play(config, events_rx).await;
    drop(conductor);
    let messages = player.await.expect("player task panicked");

    Run {
        result,
        messages,
        catalog,
        cues: effects.played(),
    }
}
