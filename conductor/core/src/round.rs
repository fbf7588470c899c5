//! Round State Machine
//!
//! The synchronous heart of a session. [`RoundSession`] owns the live
//! [`RoundState`] and is the only thing allowed to mutate it; the Conductor
//! feeds it catalog results, timer wakeups and player submissions and acts
//! on what it returns.
//!
//! # Phases
//!
//! ```text
//! Loading -> Presenting -> Guessing -> Revealed -> Loading | Terminal
//! ```
//!
//! Every transition bumps the [`PhaseToken`]. Timers and fetches are tagged
//! with the token current when they were scheduled, and any call carrying an
//! older token is a no-op. Terminal is absorbing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answer::names_match;
use crate::catalog::Entity;
use crate::messages::SessionId;
use crate::session::{ConfigurationError, Outcome, SessionConfig, SessionResult};

/// Default cap on consecutive unusable entities per round
pub const DEFAULT_MAX_SELECTION_ATTEMPTS: u32 = 20;

/// Round phases
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Fetching detail for a newly chosen entity
    Loading,
    /// Silhouette shown, answers not yet accepted
    Presenting,
    /// Clock running, one submission accepted
    Guessing,
    /// Answer shown
    Revealed,
    /// Session over
    Terminal,
}

impl Phase {
    /// Get a human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Presenting => "presenting",
            Self::Guessing => "guessing",
            Self::Revealed => "revealed",
            Self::Terminal => "finished",
        }
    }
}

/// Identifies the phase a wakeup was scheduled in
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhaseToken(u64);

impl PhaseToken {
    /// Raw counter
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The live round state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundState {
    /// 1-based round number
    pub round_index: u32,
    /// Correct answers so far
    pub score: u32,
    /// Entity for this round (absent while loading)
    pub current_entity: Option<Entity>,
    /// Option names (empty in free-text mode)
    pub options: Vec<String>,
    /// Seconds left, only while guessing
    pub time_remaining: Option<u32>,
    /// Current phase
    pub phase: Phase,
}

/// Read-only view handed to the presentation layer
///
/// The entity is withheld until the round is revealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// 1-based round
    pub round_index: u32,
    /// Rounds in the session
    pub round_count: u32,
    /// Correct answers so far
    pub score: u32,
    /// Current phase
    pub phase: Phase,
    /// Offered names (empty for typed answers)
    pub options: Vec<String>,
    /// Seconds left while guessing
    pub time_remaining: Option<u32>,
    /// Artwork for the silhouette
    pub image_url: Option<String>,
    /// The answer, once revealed
    pub entity: Option<Entity>,
}

/// A player's answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submission {
    /// Index into the round's options
    Choice(usize),
    /// Typed name
    Text(String),
}

/// How a round was scored
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// 1-based round
    pub round_index: u32,
    /// Whether the answer was right
    pub correct: bool,
    /// What the player answered (absent on timeout)
    pub submitted: Option<String>,
    /// The clock ran out before an answer
    pub timed_out: bool,
    /// The answer
    pub entity: Entity,
    /// Score after this round
    pub score: u32,
    /// Whether this miss ends a sudden-death session
    pub ends_session: bool,
}

/// Result of a countdown tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from an earlier phase, ignored
    Stale,
    /// Clock still running
    Remaining(u32),
    /// Clock ran out, the round is revealed as a miss
    Expired(Verdict),
}

/// Result of leaving the reveal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Alarm from an earlier phase, ignored
    Stale,
    /// Next round is loading
    NextRound {
        /// The round now loading (1-based)
        round_index: u32,
    },
    /// All rounds played
    Completed(SessionResult),
    /// A sudden-death loss is pending, nothing to do
    AwaitingTermination,
}

/// Result of reporting an unusable entity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionRetry {
    /// Pick another entity
    Retry {
        /// Attempts used so far this round
        attempt: u32,
    },
    /// Cap reached, the session has to end
    Exhausted {
        /// Attempts made before giving up
        attempts: u32,
    },
}

/// Requests the current phase doesn't allow
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The action needs a different phase
    #[error("{action} is not allowed while {}", .phase.description())]
    WrongPhase {
        /// What was attempted
        action: &'static str,
        /// Phase at the time
        phase: Phase,
    },

    /// A wakeup from an earlier phase
    #[error("phase token {got} is stale (current {current})")]
    Stale {
        /// Token the wakeup carried
        got: u64,
        /// Token of the current phase
        current: u64,
    },

    /// No option at that index
    #[error("choice {index} is out of range ({available} options)")]
    ChoiceOutOfRange {
        /// Submitted index
        index: usize,
        /// Options on offer
        available: usize,
    },

    /// A choice was submitted in free-text mode
    #[error("this round takes a typed answer, not a choice")]
    NoChoices,

    /// The entity can't be silhouetted
    #[error("entity '{0}' has no image to present")]
    MissingMedia(String),

    /// The options don't hold the answer exactly once
    #[error("options must contain '{0}' exactly once")]
    InvalidOptions(String),
}

/// Round/session state machine
#[derive(Debug)]
pub struct RoundSession {
    id: SessionId,
    config: SessionConfig,
    state: RoundState,
    token: PhaseToken,
    rounds_played: u32,
    sudden_death_pending: bool,
    selection_attempts: u32,
    max_selection_attempts: u32,
    identified: Vec<String>,
    result: Option<SessionResult>,
}

impl RoundSession {
    /// Start a session in round 1, Loading
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the config is invalid.
    pub fn new(
        config: SessionConfig,
        max_selection_attempts: u32,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            id: SessionId::new(),
            config,
            state: RoundState {
                round_index: 1,
                score: 0,
                current_entity: None,
                options: Vec::new(),
                time_remaining: None,
                phase: Phase::Loading,
            },
            token: PhaseToken(1),
            rounds_played: 0,
            sudden_death_pending: false,
            selection_attempts: 0,
            max_selection_attempts: max_selection_attempts.max(1),
            identified: Vec::new(),
            result: None,
        })
    }

    // ============================================
    // Accessors
    // ============================================

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The config the session runs with
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Full state, entity included
    #[must_use]
    pub fn state(&self) -> &RoundState {
        &self.state
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Token of the current phase
    #[must_use]
    pub fn token(&self) -> PhaseToken {
        self.token
    }

    /// Whether the session has ended
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.phase == Phase::Terminal
    }

    /// The final report, once terminal
    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    /// Read-only view for the presentation layer
    #[must_use]
    pub fn snapshot(&self) -> RoundSnapshot {
        let revealed = matches!(self.state.phase, Phase::Revealed | Phase::Terminal);
        RoundSnapshot {
            round_index: self.state.round_index,
            round_count: self.config.round_count,
            score: self.state.score,
            phase: self.state.phase,
            options: self.state.options.clone(),
            time_remaining: self.state.time_remaining,
            image_url: self
                .state
                .current_entity
                .as_ref()
                .and_then(|entity| entity.image_url.clone()),
            entity: if revealed {
                self.state.current_entity.clone()
            } else {
                None
            },
        }
    }

    // ============================================
    // Transitions
    // ============================================

    fn transition(&mut self, phase: Phase) {
        let from = self.state.phase;
        self.state.phase = phase;
        self.token = self.token.next();
        tracing::debug!(
            session_id = %self.id,
            round = self.state.round_index,
            from = from.description(),
            to = phase.description(),
            token = self.token.value(),
            "Phase transition"
        );
    }

    fn require(&self, action: &'static str, phase: Phase) -> Result<(), TransitionError> {
        if self.state.phase == phase {
            Ok(())
        } else {
            Err(TransitionError::WrongPhase {
                action,
                phase: self.state.phase,
            })
        }
    }

    fn check_token(&self, token: PhaseToken) -> Result<(), TransitionError> {
        if token == self.token {
            Ok(())
        } else {
            Err(TransitionError::Stale {
                got: token.value(),
                current: self.token.value(),
            })
        }
    }

    /// Loading -> Presenting with a fetched entity and its options
    ///
    /// # Errors
    ///
    /// Fails outside Loading, when the entity has no image, or when a
    /// non-empty option set doesn't contain the entity name exactly once.
    pub fn present(
        &mut self,
        entity: Entity,
        options: Vec<String>,
    ) -> Result<PhaseToken, TransitionError> {
        self.require("presenting an entity", Phase::Loading)?;
        if !entity.is_presentable() {
            return Err(TransitionError::MissingMedia(entity.name));
        }
        if !options.is_empty() && options.iter().filter(|o| **o == entity.name).count() != 1 {
            return Err(TransitionError::InvalidOptions(entity.name));
        }

        self.selection_attempts = 0;
        self.state.current_entity = Some(entity);
        self.state.options = options;
        self.state.time_remaining = None;
        self.transition(Phase::Presenting);
        Ok(self.token)
    }

    /// Record an entity that can't be presented while Loading
    ///
    /// # Errors
    ///
    /// Fails outside Loading.
    pub fn note_incomplete(&mut self) -> Result<SelectionRetry, TransitionError> {
        self.require("re-selecting", Phase::Loading)?;
        self.selection_attempts += 1;
        if self.selection_attempts >= self.max_selection_attempts {
            Ok(SelectionRetry::Exhausted {
                attempts: self.selection_attempts,
            })
        } else {
            Ok(SelectionRetry::Retry {
                attempt: self.selection_attempts,
            })
        }
    }

    /// Presenting -> Guessing once the presentation delay elapsed
    ///
    /// Returns the seconds on the clock.
    ///
    /// # Errors
    ///
    /// Fails on a stale token or outside Presenting.
    pub fn begin_guessing(&mut self, token: PhaseToken) -> Result<u32, TransitionError> {
        self.check_token(token)?;
        self.require("starting the clock", Phase::Presenting)?;
        let limit = self.config.time_limit_secs;
        self.state.time_remaining = Some(limit);
        self.transition(Phase::Guessing);
        Ok(limit)
    }

    /// One second elapsed
    pub fn tick(&mut self, token: PhaseToken) -> TickOutcome {
        if token != self.token || self.state.phase != Phase::Guessing {
            return TickOutcome::Stale;
        }
        let Some(entity) = self.state.current_entity.clone() else {
            return TickOutcome::Stale;
        };
        let remaining = self.state.time_remaining.unwrap_or(0).saturating_sub(1);
        self.state.time_remaining = Some(remaining);
        if remaining == 0 {
            TickOutcome::Expired(self.reveal(entity, None))
        } else {
            TickOutcome::Remaining(remaining)
        }
    }

    /// Guessing -> Revealed with the player's answer
    ///
    /// # Errors
    ///
    /// Fails outside Guessing, or for a choice that doesn't exist. State is
    /// untouched on error.
    pub fn submit(&mut self, submission: Submission) -> Result<Verdict, TransitionError> {
        self.require("answering", Phase::Guessing)?;
        let Some(entity) = self.state.current_entity.clone() else {
            return Err(TransitionError::WrongPhase {
                action: "answering",
                phase: self.state.phase,
            });
        };
        let answer = match submission {
            Submission::Text(text) => text,
            Submission::Choice(_) if self.state.options.is_empty() => {
                return Err(TransitionError::NoChoices);
            }
            Submission::Choice(index) => self
                .state
                .options
                .get(index)
                .cloned()
                .ok_or(TransitionError::ChoiceOutOfRange {
                    index,
                    available: self.state.options.len(),
                })?,
        };
        Ok(self.reveal(entity, Some(answer)))
    }

    fn reveal(&mut self, entity: Entity, submitted: Option<String>) -> Verdict {
        let correct = submitted
            .as_deref()
            .is_some_and(|answer| names_match(answer, &entity.name));

        if correct {
            self.state.score += 1;
            self.identified.push(entity.name.clone());
        } else if self.config.sudden_death {
            self.sudden_death_pending = true;
        }
        self.rounds_played += 1;
        self.state.time_remaining = None;
        self.transition(Phase::Revealed);

        Verdict {
            round_index: self.state.round_index,
            correct,
            timed_out: submitted.is_none(),
            submitted,
            entity,
            score: self.state.score,
            ends_session: self.sudden_death_pending,
        }
    }

    /// Leave the reveal after the reveal delay
    pub fn advance(&mut self, token: PhaseToken) -> Advance {
        if token != self.token || self.state.phase != Phase::Revealed {
            return Advance::Stale;
        }
        if self.sudden_death_pending {
            return Advance::AwaitingTermination;
        }
        if self.state.round_index >= self.config.round_count {
            return Advance::Completed(self.finish(Outcome::Completed));
        }

        self.state.round_index += 1;
        self.state.current_entity = None;
        self.state.options.clear();
        self.transition(Phase::Loading);
        Advance::NextRound {
            round_index: self.state.round_index,
        }
    }

    /// End a sudden-death session after its delay
    ///
    /// Returns `None` for a stale token or when no loss is pending.
    pub fn finish_sudden_death(&mut self, token: PhaseToken) -> Option<SessionResult> {
        if token != self.token
            || self.state.phase != Phase::Revealed
            || !self.sudden_death_pending
        {
            return None;
        }
        Some(self.finish(Outcome::SuddenDeathLoss))
    }

    /// End the session with a fatal error
    pub fn fail(&mut self, message: impl Into<String>) -> SessionResult {
        self.finish(Outcome::Error {
            message: message.into(),
        })
    }

    /// End the session because the player left
    pub fn abandon(&mut self) -> SessionResult {
        self.finish(Outcome::Abandoned)
    }

    /// Move to Terminal; a session that already finished keeps its result
    fn finish(&mut self, outcome: Outcome) -> SessionResult {
        if let Some(result) = &self.result {
            return result.clone();
        }

        self.state.time_remaining = None;
        self.transition(Phase::Terminal);
        let result = SessionResult {
            session_id: self.id.clone(),
            score: self.state.score,
            rounds_played: self.rounds_played,
            outcome,
            config: self.config.clone(),
            identified: self.identified.clone(),
            finished_at: Utc::now(),
        };
        tracing::info!(
            session_id = %self.id,
            score = result.score,
            rounds_played = result.rounds_played,
            outcome = result.outcome.label(),
            "Session finished"
        );
        self.result = Some(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AnswerMode;
    use pretty_assertions::assert_eq;

    fn entity(id: u32, name: &str) -> Entity {
        Entity {
            id,
            name: name.to_string(),
            image_url: Some(format!("https://img.test/{id}.png")),
            types: vec!["normal".to_string()],
            height_decimeters: 3,
            weight_decigrams: 40,
        }
    }

    fn session(rounds: u32) -> RoundSession {
        let config = SessionConfig::default()
            .with_round_count(rounds)
            .with_time_limit(3)
            .with_answer_mode(AnswerMode::MultipleChoice(2));
        RoundSession::new(config, 3).unwrap()
    }

    fn to_guessing(session: &mut RoundSession, name: &str) -> PhaseToken {
        let token = session
            .present(entity(1, name), vec![name.to_string(), "decoy".to_string()])
            .unwrap();
        session.begin_guessing(token).unwrap();
        session.token()
    }

    #[test]
    fn test_new_session_starts_loading() {
        let session = session(3);
        assert_eq!(session.phase(), Phase::Loading);
        assert_eq!(session.state().round_index, 1);
        assert_eq!(session.state().score, 0);
        assert!(session.state().current_entity.is_none());
    }

    #[test]
    fn test_rejects_zero_rounds() {
        let config = SessionConfig::default().with_round_count(0);
        assert_eq!(
            RoundSession::new(config, 3).unwrap_err(),
            ConfigurationError::NonPositiveRoundCount
        );
    }

    #[test]
    fn test_every_transition_bumps_token() {
        let mut session = session(2);
        let t0 = session.token();
        let t1 = session.present(entity(1, "eevee"), Vec::new()).unwrap();
        assert!(t1 > t0);
        session.begin_guessing(t1).unwrap();
        let t2 = session.token();
        assert!(t2 > t1);
        session.submit(Submission::Text("eevee".into())).unwrap();
        assert!(session.token() > t2);
    }

    #[test]
    fn test_correct_choice_scores() {
        let mut session = session(2);
        to_guessing(&mut session, "eevee");

        let verdict = session.submit(Submission::Choice(0)).unwrap();
        assert!(verdict.correct);
        assert!(!verdict.timed_out);
        assert_eq!(verdict.score, 1);
        assert_eq!(session.phase(), Phase::Revealed);
        assert_eq!(session.snapshot().entity.map(|e| e.name), Some("eevee".into()));
    }

    #[test]
    fn test_snapshot_hides_entity_until_revealed() {
        let mut session = session(1);
        to_guessing(&mut session, "eevee");
        let snapshot = session.snapshot();
        assert!(snapshot.entity.is_none());
        assert_eq!(snapshot.image_url.as_deref(), Some("https://img.test/1.png"));
        assert_eq!(snapshot.time_remaining, Some(3));
    }

    #[test]
    fn test_second_submission_rejected() {
        let mut session = session(2);
        to_guessing(&mut session, "eevee");
        session.submit(Submission::Choice(1)).unwrap();

        let err = session.submit(Submission::Choice(0)).unwrap_err();
        assert!(matches!(err, TransitionError::WrongPhase { .. }));
        assert_eq!(session.state().score, 0);
    }

    #[test]
    fn test_invalid_choice_leaves_state_untouched() {
        let mut session = session(2);
        to_guessing(&mut session, "eevee");
        let before = session.state().clone();

        assert_eq!(
            session.submit(Submission::Choice(5)).unwrap_err(),
            TransitionError::ChoiceOutOfRange {
                index: 5,
                available: 2
            }
        );
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_choice_in_free_text_mode_rejected() {
        let mut session = session(1);
        let token = session.present(entity(1, "eevee"), Vec::new()).unwrap();
        session.begin_guessing(token).unwrap();
        assert_eq!(
            session.submit(Submission::Choice(0)).unwrap_err(),
            TransitionError::NoChoices
        );
        assert_eq!(session.phase(), Phase::Guessing);
    }

    #[test]
    fn test_timeout_is_a_miss() {
        let mut session = session(1);
        let token = to_guessing(&mut session, "eevee");

        assert_eq!(session.tick(token), TickOutcome::Remaining(2));
        assert_eq!(session.tick(token), TickOutcome::Remaining(1));
        let TickOutcome::Expired(verdict) = session.tick(token) else {
            panic!("expected expiry");
        };
        assert!(!verdict.correct);
        assert!(verdict.timed_out);
        assert_eq!(session.phase(), Phase::Revealed);
    }

    #[test]
    fn test_stale_tick_after_answer_is_ignored() {
        let mut session = session(2);
        let guessing = to_guessing(&mut session, "eevee");
        session.submit(Submission::Text("Eevee".into())).unwrap();
        let before = session.state().clone();

        assert_eq!(session.tick(guessing), TickOutcome::Stale);
        assert_eq!(session.advance(guessing), Advance::Stale);
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_stale_presentation_alarm_is_ignored() {
        let mut session = session(1);
        let token = session.present(entity(1, "eevee"), Vec::new()).unwrap();
        session.begin_guessing(token).unwrap();
        assert!(matches!(
            session.begin_guessing(token),
            Err(TransitionError::Stale { .. })
        ));
    }

    #[test]
    fn test_advance_to_next_round_then_complete() {
        let mut session = session(2);
        to_guessing(&mut session, "eevee");
        session.submit(Submission::Choice(0)).unwrap();

        assert_eq!(
            session.advance(session.token()),
            Advance::NextRound { round_index: 2 }
        );
        assert_eq!(session.phase(), Phase::Loading);
        assert!(session.state().current_entity.is_none());

        to_guessing(&mut session, "jolteon");
        session.submit(Submission::Choice(1)).unwrap();
        let Advance::Completed(result) = session.advance(session.token()) else {
            panic!("expected completion");
        };
        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(result.rounds_played, 2);
        assert_eq!(result.score, 1);
        assert_eq!(result.identified, vec!["eevee".to_string()]);
        assert!(session.is_terminal());
    }

    #[test]
    fn test_sudden_death_waits_for_its_alarm() {
        let config = SessionConfig::default()
            .with_round_count(5)
            .with_sudden_death(true);
        let mut session = RoundSession::new(config, 3).unwrap();
        let token = session.present(entity(1, "eevee"), Vec::new()).unwrap();
        session.begin_guessing(token).unwrap();

        let verdict = session.submit(Submission::Text("vaporeon".into())).unwrap();
        assert!(verdict.ends_session);

        let revealed = session.token();
        assert_eq!(session.advance(revealed), Advance::AwaitingTermination);
        let result = session.finish_sudden_death(revealed).unwrap();
        assert_eq!(result.outcome, Outcome::SuddenDeathLoss);
        assert_eq!(result.rounds_played, 1);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_sudden_death_ignored_after_correct_answer() {
        let config = SessionConfig::default().with_sudden_death(true);
        let mut session = RoundSession::new(config, 3).unwrap();
        let token = session.present(entity(1, "eevee"), Vec::new()).unwrap();
        session.begin_guessing(token).unwrap();
        session.submit(Submission::Text("eevee".into())).unwrap();
        assert!(session.finish_sudden_death(session.token()).is_none());
    }

    #[test]
    fn test_selection_retry_cap() {
        let mut session = session(1);
        assert_eq!(
            session.note_incomplete(),
            Ok(SelectionRetry::Retry { attempt: 1 })
        );
        assert_eq!(
            session.note_incomplete(),
            Ok(SelectionRetry::Retry { attempt: 2 })
        );
        assert_eq!(
            session.note_incomplete(),
            Ok(SelectionRetry::Exhausted { attempts: 3 })
        );
    }

    #[test]
    fn test_present_rejects_missing_media_and_bad_options() {
        let mut session = session(1);
        let mut blank = entity(1, "eevee");
        blank.image_url = None;
        assert_eq!(
            session.present(blank, Vec::new()),
            Err(TransitionError::MissingMedia("eevee".into()))
        );
        assert_eq!(
            session.present(entity(1, "eevee"), vec!["a".into(), "b".into()]),
            Err(TransitionError::InvalidOptions("eevee".into()))
        );
        assert_eq!(session.phase(), Phase::Loading);
    }

    #[test]
    fn test_terminal_is_absorbing() {
        let mut session = session(3);
        let first = session.abandon();
        assert_eq!(first.outcome, Outcome::Abandoned);
        assert_eq!(first.rounds_played, 0);

        let second = session.fail("late failure");
        assert_eq!(second, first);
        assert!(session.present(entity(1, "eevee"), Vec::new()).is_err());
        assert_eq!(session.tick(session.token()), TickOutcome::Stale);
    }
}
