//! Who's That - Headless Silhouette Trivia Engine
//!
//! This crate holds the whole game logic of a "who's that creature?" quiz,
//! independent of any front-end. It can drive a terminal UI, a web UI, or
//! run headless for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Presentation Layer                       │
//! │        (terminal CLI, web UI, headless test player)          │
//! │                            │                                 │
//! │                   PlayerEvent (up)                           │
//! │                   GameMessage (down)                         │
//! └────────────────────────────┼─────────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼─────────────────────────────────┐
//! │                      WHOSTHAT CORE                           │
//! │  ┌─────────────────────────┴──────────────────────────────┐  │
//! │  │                      Conductor                         │  │
//! │  │  ┌────────────┐  ┌─────────┐  ┌──────────┐  ┌───────┐  │  │
//! │  │  │   Round    │  │ Options │  │  Phase   │  │ Store │  │  │
//! │  │  │  Session   │  │         │  │  Timers  │  │       │  │  │
//! │  │  └────────────┘  └─────────┘  └──────────┘  └───────┘  │  │
//! │  └─────────────────────────┬──────────────────────────────┘  │
//! │                            │                                 │
//! │                     CatalogClient                            │
//! │            (PokeAPI, cached, in-memory)                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: runs sessions and talks to the presentation layer
//! - [`RoundSession`]: the synchronous round state machine
//! - [`SessionConfig`] / [`SessionResult`]: what goes in, what comes out
//! - [`GameMessage`] / [`PlayerEvent`]: the presentation protocol
//! - [`CatalogClient`]: where entities come from
//! - [`ProgressStore`]: high score and collection
//!
//! # Quick Start
//!
//! ```ignore
//! use whosthat_core::{
//!     catalog::{CachedCatalog, PokeApiCatalog, DEFAULT_BASE_URL},
//!     Conductor, ConductorConfig, PlayerEvent, SessionConfig,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let (events_tx, events_rx) = mpsc::channel(16);
//!
//!     let catalog = CachedCatalog::new(PokeApiCatalog::new(DEFAULT_BASE_URL)?);
//!     let mut conductor = Conductor::new(catalog, ConductorConfig::default(), tx);
//!
//!     // Render messages from `rx`, send answers through `events_tx`
//!     let result = conductor.play(SessionConfig::default(), events_rx).await?;
//!     println!("{} / {}", result.score, result.rounds_played);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`answer`]: name normalization and matching
//! - [`catalog`]: catalog trait and adapters
//! - [`conductor`]: the session run loop
//! - [`config`]: TOML/env configuration
//! - [`effects`]: cue sink for sounds
//! - [`events`]: events from the presentation layer
//! - [`messages`]: messages to the presentation layer
//! - [`options`]: multiple-choice option generation
//! - [`round`]: round state machine
//! - [`session`]: session config and results
//! - [`store`]: progress persistence
//! - [`timers`]: phase-scoped timers and fetches

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod answer;
pub mod catalog;
pub mod conductor;
pub mod config;
pub mod effects;
pub mod events;
pub mod messages;
pub mod options;
pub mod round;
pub mod session;
pub mod store;
pub mod timers;

// Re-exports for convenience
pub use answer::{display_name, names_match, normalize_name};
pub use catalog::{
    CachedCatalog, CandidatePool, CatalogClient, CatalogError, CategoryId, DexEntry, Entity,
    EntityRef, InMemoryCatalog, PokeApiCatalog, Rarity,
};
pub use conductor::{Conductor, ConductorConfig};
pub use effects::{Cue, Effects, NoEffects, RecordingEffects};
pub use events::PlayerEvent;
pub use messages::{EventId, GameMessage, NotifyLevel, SessionId};
pub use options::{generate_options, OptionError};
pub use round::{
    Advance, Phase, PhaseToken, RoundSession, RoundSnapshot, RoundState, SelectionRetry,
    Submission, TickOutcome, TransitionError, Verdict,
};
pub use session::{
    AnswerMode, ConfigurationError, Difficulty, Outcome, Rating, SessionConfig, SessionError,
    SessionResult,
};
pub use store::{
    collection_progress, CollectionProgress, CollectionSlot, JsonFileStore, KeyValueStore,
    MemoryStore, ProgressStore, RecordOutcome, StoreError,
};
pub use timers::{Alarm, PhaseTimers, Wakeup};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, GameConfig, GameToml,
};
