//! The Conductor
//!
//! Drives one session at a time: validates the config, builds the candidate
//! pool, then runs the round loop until the session reaches its terminal
//! outcome. The Conductor is headless. It talks to the presentation layer
//! only through [`GameMessage`]s going out and [`PlayerEvent`]s coming in.
//!
//! # Run loop
//!
//! A single task owns the [`RoundSession`] and selects over two inputs:
//! player events and phase wakeups (timers and fetches registered in
//! [`PhaseTimers`]). Every transition cancels the wakeups of the phase it
//! leaves, and wakeups that still slip through carry a stale token and are
//! dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::mpsc;

use crate::catalog::{CandidatePool, CatalogClient, CatalogError, Entity, EntityRef};
use crate::effects::{Cue, Effects, NoEffects};
use crate::events::PlayerEvent;
use crate::messages::{GameMessage, NotifyLevel};
use crate::options::generate_options;
use crate::round::{
    Advance, PhaseToken, RoundSession, SelectionRetry, Submission, TickOutcome, Verdict,
    DEFAULT_MAX_SELECTION_ATTEMPTS,
};
use crate::session::{
    AnswerMode, ConfigurationError, Difficulty, SessionConfig, SessionError, SessionResult,
};
use crate::store::ProgressStore;
use crate::timers::{Alarm, PhaseTimers, Wakeup};

/// Default pause between showing a silhouette and starting the clock
pub const DEFAULT_PRESENTATION_DELAY: Duration = Duration::from_millis(1500);
/// Default time the answer stays on screen
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(3000);
/// Default pause before a sudden-death loss ends the session
pub const DEFAULT_SUDDEN_DEATH_DELAY: Duration = Duration::from_millis(2000);

/// Conductor configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConductorConfig {
    /// Presenting -> Guessing delay
    pub presentation_delay: Duration,
    /// How long the answer is shown
    pub reveal_delay: Duration,
    /// Delay before a sudden-death loss ends the session
    pub sudden_death_delay: Duration,
    /// Countdown granularity
    pub tick_interval: Duration,
    /// Unusable entities tolerated per round
    pub max_selection_attempts: u32,
    /// Seed for entity selection and option order (random when absent)
    pub seed: Option<u64>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            presentation_delay: DEFAULT_PRESENTATION_DELAY,
            reveal_delay: DEFAULT_REVEAL_DELAY,
            sudden_death_delay: DEFAULT_SUDDEN_DEATH_DELAY,
            tick_interval: Duration::from_secs(1),
            max_selection_attempts: DEFAULT_MAX_SELECTION_ATTEMPTS,
            seed: None,
        }
    }
}

impl ConductorConfig {
    /// Fix the random sequence
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Everything the run loop owns for one session
struct ActiveSession {
    session: RoundSession,
    pool: CandidatePool,
    drawn: HashSet<u32>,
    timers: PhaseTimers,
    finished: Option<SessionResult>,
}

/// The Conductor - headless session orchestrator
pub struct Conductor<C: CatalogClient> {
    /// Configuration
    config: ConductorConfig,
    /// Entity catalog
    catalog: Arc<C>,
    /// Cue sink
    effects: Arc<dyn Effects>,
    /// Where progress is recorded (none disables recording)
    store: Option<ProgressStore>,
    /// Channel to the presentation layer
    tx: mpsc::Sender<GameMessage>,
    /// Selection and shuffling
    rng: StdRng,
}

impl<C: CatalogClient + 'static> Conductor<C> {
    /// Create a new Conductor owning its catalog
    pub fn new(catalog: C, config: ConductorConfig, tx: mpsc::Sender<GameMessage>) -> Self {
        Self::with_shared_catalog(Arc::new(catalog), config, tx)
    }

    /// Create a new Conductor over a catalog shared with other sessions
    pub fn with_shared_catalog(
        catalog: Arc<C>,
        config: ConductorConfig,
        tx: mpsc::Sender<GameMessage>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            catalog,
            effects: Arc::new(NoEffects),
            store: None,
            tx,
            rng,
        }
    }

    /// Route cues to the given effects
    #[must_use]
    pub fn with_effects(mut self, effects: impl Effects + 'static) -> Self {
        self.effects = Arc::new(effects);
        self
    }

    /// Record progress after every session
    #[must_use]
    pub fn with_store(mut self, store: ProgressStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Get the catalog
    #[must_use]
    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Play one session to its terminal outcome
    ///
    /// Events are read from `events` until the session ends; closing the
    /// channel abandons the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session can't start: an invalid
    /// config, an unusable pool, or a pool fetch failure. Failures after
    /// the first round started are reported through the result's outcome.
    pub async fn play(
        &mut self,
        config: SessionConfig,
        events: mpsc::Receiver<PlayerEvent>,
    ) -> Result<SessionResult, SessionError> {
        let (session, pool) = self.prepare(config).await?;
        Ok(self.run(session, pool, events).await)
    }

    /// Validate the config and build the candidate pool
    async fn prepare(
        &self,
        config: SessionConfig,
    ) -> Result<(RoundSession, CandidatePool), SessionError> {
        let session = RoundSession::new(config, self.config.max_selection_attempts)?;
        let config = session.config();

        let pool = match config.difficulty {
            Difficulty::Normal => self.catalog.fetch_pool(&config.categories).await?,
            Difficulty::Filtered => self.catalog.fetch_common_pool(&config.categories).await?,
        };

        if pool.is_empty() {
            return Err(ConfigurationError::EmptyPool {
                categories: config.categories_label(),
            }
            .into());
        }
        if let AnswerMode::MultipleChoice(needed) = config.answer_mode {
            let available = pool.distinct_names();
            if available < needed as usize {
                return Err(ConfigurationError::InsufficientPool { needed, available }.into());
            }
        }

        Ok((session, pool))
    }

    async fn run(
        &mut self,
        session: RoundSession,
        pool: CandidatePool,
        mut events: mpsc::Receiver<PlayerEvent>,
    ) -> SessionResult {
        let (timers, mut wakeups) = PhaseTimers::new(self.config.tick_interval);
        let mut active = ActiveSession {
            session,
            pool,
            drawn: HashSet::new(),
            timers,
            finished: None,
        };

        tracing::info!(
            session_id = %active.session.id(),
            catalog = self.catalog.name(),
            categories = %active.session.config().categories_label(),
            pool_size = active.pool.len(),
            rounds = active.session.config().round_count,
            "Session started"
        );
        self.send(GameMessage::SessionStarted {
            session_id: active.session.id().clone(),
            config: active.session.config().clone(),
            pool_size: active.pool.len(),
        })
        .await;
        self.send_state(&active).await;
        self.select_entity(&mut active).await;

        let result = loop {
            if let Some(result) = active.finished.take() {
                break result;
            }
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(&mut active, event).await,
                    None => {
                        tracing::info!("Player event channel closed, abandoning session");
                        Self::abandon(&mut active);
                    }
                },
                Some(wakeup) = wakeups.recv() => self.handle_wakeup(&mut active, wakeup).await,
            }
        };

        active.timers.cancel_all();
        self.effects.play(Cue::SessionEnded);
        self.send_state(&active).await;
        self.send(GameMessage::SessionComplete {
            result: result.clone(),
        })
        .await;
        self.record_progress(&result).await;
        result
    }

    // ============================================
    // Player events
    // ============================================

    async fn handle_event(&mut self, active: &mut ActiveSession, event: PlayerEvent) {
        let event_id = event.event_id().clone();
        let submission = match event {
            PlayerEvent::QuitRequested { .. } => {
                tracing::info!(session_id = %active.session.id(), "Player quit");
                self.send(GameMessage::Ack { event_id }).await;
                Self::abandon(active);
                return;
            }
            PlayerEvent::ChoiceSelected { index, .. } => Submission::Choice(index),
            PlayerEvent::TextSubmitted { text, .. } => Submission::Text(text),
        };

        match active.session.submit(submission) {
            Ok(verdict) => {
                self.send(GameMessage::Ack { event_id }).await;
                self.on_revealed(active, verdict).await;
            }
            Err(err) => {
                tracing::debug!(event_id = %event_id.0, reason = %err, "Rejected submission");
                self.send(GameMessage::Rejected {
                    event_id,
                    reason: err.to_string(),
                })
                .await;
            }
        }
    }

    // ============================================
    // Wakeups
    // ============================================

    async fn handle_wakeup(&mut self, active: &mut ActiveSession, wakeup: Wakeup) {
        let current = active.session.token();
        if wakeup.token() != current {
            tracing::trace!(
                token = wakeup.token().value(),
                current = current.value(),
                "Dropping stale wakeup"
            );
            return;
        }

        match wakeup {
            Wakeup::Fetched {
                reference, result, ..
            } => self.on_fetched(active, reference, result).await,
            Wakeup::Tick { token } => match active.session.tick(token) {
                TickOutcome::Stale => {}
                TickOutcome::Remaining(time_remaining) => {
                    self.send(GameMessage::Tick { time_remaining }).await;
                }
                TickOutcome::Expired(verdict) => self.on_revealed(active, verdict).await,
            },
            Wakeup::Alarm { token, alarm } => match alarm {
                Alarm::PresentationElapsed => self.on_presentation_elapsed(active, token).await,
                Alarm::RevealElapsed => self.on_reveal_elapsed(active, token).await,
                Alarm::SuddenDeath => {
                    if let Some(result) = active.session.finish_sudden_death(token) {
                        active.timers.cancel_all();
                        active.finished = Some(result);
                    }
                }
            },
        }
    }

    async fn on_fetched(
        &mut self,
        active: &mut ActiveSession,
        reference: EntityRef,
        result: Result<Entity, CatalogError>,
    ) {
        let entity = match result {
            Ok(entity) if entity.is_presentable() => entity,
            Ok(_) | Err(CatalogError::EntityIncomplete { .. }) => {
                self.retry_selection(active, &reference).await;
                return;
            }
            Err(err) => {
                self.fail(active, err.to_string()).await;
                return;
            }
        };

        let answer_mode = active.session.config().answer_mode;
        let round_count = active.session.config().round_count;
        let options = match generate_options(&entity, &active.pool, answer_mode, &mut self.rng) {
            Ok(options) => options,
            Err(err) => {
                self.fail(active, err.to_string()).await;
                return;
            }
        };
        let image_url = entity.image_url.clone().unwrap_or_default();

        match active.session.present(entity, options.clone()) {
            Ok(token) => {
                active.timers.cancel_all();
                active
                    .timers
                    .schedule(token, Alarm::PresentationElapsed, self.config.presentation_delay);
                self.effects.play(Cue::Presented);
                self.send_state(active).await;
                self.send(GameMessage::RoundPresented {
                    round_index: active.session.state().round_index,
                    round_count,
                    image_url,
                    options,
                })
                .await;
            }
            Err(err) => self.fail(active, err.to_string()).await,
        }
    }

    async fn on_presentation_elapsed(&mut self, active: &mut ActiveSession, token: PhaseToken) {
        match active.session.begin_guessing(token) {
            Ok(time_limit_secs) => {
                active.timers.cancel_all();
                active.timers.start_countdown(active.session.token());
                self.send_state(active).await;
                self.send(GameMessage::GuessingStarted { time_limit_secs }).await;
            }
            Err(err) => tracing::trace!(reason = %err, "Ignoring presentation alarm"),
        }
    }

    async fn on_revealed(&mut self, active: &mut ActiveSession, verdict: Verdict) {
        active.timers.cancel_all();
        let token = active.session.token();
        active
            .timers
            .schedule(token, Alarm::RevealElapsed, self.config.reveal_delay);
        if verdict.ends_session {
            active
                .timers
                .schedule(token, Alarm::SuddenDeath, self.config.sudden_death_delay);
        }

        tracing::debug!(
            session_id = %active.session.id(),
            round = verdict.round_index,
            correct = verdict.correct,
            timed_out = verdict.timed_out,
            score = verdict.score,
            "Round revealed"
        );
        self.effects
            .play(if verdict.correct { Cue::Correct } else { Cue::Wrong });
        self.send_state(active).await;
        self.send(GameMessage::AnswerRevealed { verdict }).await;
    }

    async fn on_reveal_elapsed(&mut self, active: &mut ActiveSession, token: PhaseToken) {
        match active.session.advance(token) {
            Advance::NextRound { round_index } => {
                tracing::debug!(round = round_index, "Next round");
                active.timers.cancel_all();
                self.send_state(active).await;
                self.select_entity(active).await;
            }
            Advance::Completed(result) => {
                active.timers.cancel_all();
                active.finished = Some(result);
            }
            Advance::AwaitingTermination => {
                tracing::debug!("Reveal elapsed, sudden-death loss pending");
            }
            Advance::Stale => tracing::trace!("Ignoring reveal alarm"),
        }
    }

    // ============================================
    // Selection
    // ============================================

    /// Draw an entity and start fetching its detail
    async fn select_entity(&mut self, active: &mut ActiveSession) {
        let Some(reference) = self.draw(active) else {
            self.fail(active, "candidate pool is empty").await;
            return;
        };

        tracing::debug!(
            round = active.session.state().round_index,
            entity = %reference.name,
            "Fetching entity detail"
        );
        let catalog = Arc::clone(&self.catalog);
        let target = reference.clone();
        active
            .timers
            .spawn_fetch(active.session.token(), reference, async move {
                catalog.fetch_detail(&target).await
            });
    }

    /// Uniform draw, no repeats until the pool is exhausted
    fn draw(&mut self, active: &mut ActiveSession) -> Option<EntityRef> {
        let mut fresh: Vec<&EntityRef> = active
            .pool
            .entries()
            .iter()
            .filter(|entry| !active.drawn.contains(&entry.id))
            .collect();
        if fresh.is_empty() {
            tracing::debug!(pool_size = active.pool.len(), "Pool exhausted, allowing repeats");
            active.drawn.clear();
            fresh = active.pool.entries().iter().collect();
        }

        let reference = fresh.choose(&mut self.rng).map(|entry| (*entry).clone())?;
        active.drawn.insert(reference.id);
        Some(reference)
    }

    async fn retry_selection(&mut self, active: &mut ActiveSession, reference: &EntityRef) {
        match active.session.note_incomplete() {
            Ok(SelectionRetry::Retry { attempt }) => {
                tracing::warn!(
                    entity = %reference.name,
                    attempt,
                    "Entity has no artwork, selecting another"
                );
                self.select_entity(active).await;
            }
            Ok(SelectionRetry::Exhausted { attempts }) => {
                self.fail(
                    active,
                    format!("no entity with artwork found after {attempts} attempts"),
                )
                .await;
            }
            Err(err) => tracing::debug!(reason = %err, "Ignoring incomplete entity"),
        }
    }

    // ============================================
    // Termination
    // ============================================

    fn abandon(active: &mut ActiveSession) {
        active.timers.cancel_all();
        active.finished = Some(active.session.abandon());
    }

    async fn fail(&self, active: &mut ActiveSession, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(session_id = %active.session.id(), error = %message, "Session failed");
        active.timers.cancel_all();
        self.send(GameMessage::Notify {
            level: NotifyLevel::Error,
            message: message.clone(),
        })
        .await;
        active.finished = Some(active.session.fail(message));
    }

    async fn record_progress(&self, result: &SessionResult) {
        let Some(store) = &self.store else {
            return;
        };

        match store.record(result).await {
            Ok(outcome) => {
                if outcome.new_high_score {
                    self.send(GameMessage::Notify {
                        level: NotifyLevel::Success,
                        message: format!("New high score: {}", outcome.high_score),
                    })
                    .await;
                }
                self.send(GameMessage::ProgressUpdated {
                    high_score: outcome.high_score,
                    new_high_score: outcome.new_high_score,
                    newly_unlocked: outcome.newly_unlocked,
                })
                .await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to save progress");
                self.send(GameMessage::Notify {
                    level: NotifyLevel::Warning,
                    message: format!("Progress was not saved: {err}"),
                })
                .await;
            }
        }
    }

    // ============================================
    // Outgoing messages
    // ============================================

    async fn send_state(&self, active: &ActiveSession) {
        self.send(GameMessage::State {
            snapshot: active.session.snapshot(),
        })
        .await;
    }

    /// Send a message to the presentation layer
    async fn send(&self, msg: GameMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to presentation layer: {}", e);
        }
    }
}
