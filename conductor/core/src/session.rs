//! Session configuration and results
//!
//! A session is described by an immutable [`SessionConfig`] going in and a
//! [`SessionResult`] coming out. Everything in between is owned by the
//! round state machine in [`crate::round`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogError, CategoryId};
use crate::messages::SessionId;

/// Default seconds per round
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 10;
/// Default number of options in multiple-choice mode
pub const DEFAULT_OPTION_COUNT: u32 = 4;
/// Default rounds per session
pub const DEFAULT_ROUND_COUNT: u32 = 10;
/// Highest generation the setup screen offers
pub const MAX_CATEGORY: u16 = 9;

/// How the player answers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Pick one of `n` names
    MultipleChoice(u32),
    /// Type the name
    FreeText,
}

impl Default for AnswerMode {
    fn default() -> Self {
        Self::MultipleChoice(DEFAULT_OPTION_COUNT)
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleChoice(n) => write!(f, "{n}"),
            Self::FreeText => f.write_str("free"),
        }
    }
}

impl FromStr for AnswerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "free" | "free-text" | "free_text" | "text" => Ok(Self::FreeText),
            other => other
                .parse::<u32>()
                .map(Self::MultipleChoice)
                .map_err(|_| {
                    format!("invalid answer mode '{other}' (expected a number or 'free')")
                }),
        }
    }
}

/// Which entities are eligible
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Every entity in the selected categories
    #[default]
    Normal,
    /// Legendary and mythical entities excluded
    Filtered,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Filtered => f.write_str("filtered"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "filtered" | "no-legendaries" => Ok(Self::Filtered),
            other => Err(format!(
                "invalid difficulty '{other}' (expected 'normal' or 'filtered')"
            )),
        }
    }
}

/// Immutable description of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Categories the pool is built from
    pub categories: BTreeSet<CategoryId>,
    /// Seconds the player has per round
    pub time_limit_secs: u32,
    /// Multiple choice or free text
    pub answer_mode: AnswerMode,
    /// Rounds before the session completes
    pub round_count: u32,
    /// Eligibility filter
    pub difficulty: Difficulty,
    /// Whether the first miss ends the session
    pub sudden_death: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            categories: BTreeSet::from([CategoryId(1)]),
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            answer_mode: AnswerMode::default(),
            round_count: DEFAULT_ROUND_COUNT,
            difficulty: Difficulty::Normal,
            sudden_death: false,
        }
    }
}

impl SessionConfig {
    /// Create a config for the given categories with default settings
    pub fn new(categories: impl IntoIterator<Item = CategoryId>) -> Self {
        Self {
            categories: categories.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Every category the setup screen offers
    #[must_use]
    pub fn all_categories() -> BTreeSet<CategoryId> {
        (1..=MAX_CATEGORY).map(CategoryId).collect()
    }

    /// Seconds per guess
    #[must_use]
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = secs;
        self
    }

    /// Choices or typed answers
    #[must_use]
    pub fn with_answer_mode(mut self, mode: AnswerMode) -> Self {
        self.answer_mode = mode;
        self
    }

    /// Rounds to play
    #[must_use]
    pub fn with_round_count(mut self, rounds: u32) -> Self {
        self.round_count = rounds;
        self
    }

    /// Leave rare entries in or out
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// End at the first miss
    #[must_use]
    pub fn with_sudden_death(mut self, enabled: bool) -> Self {
        self.sudden_death = enabled;
        self
    }

    /// Check the config before anything is fetched
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.categories.is_empty() {
            return Err(ConfigurationError::NoCategories);
        }
        if self.time_limit_secs == 0 {
            return Err(ConfigurationError::NonPositiveTimeLimit);
        }
        if self.round_count == 0 {
            return Err(ConfigurationError::NonPositiveRoundCount);
        }
        if let AnswerMode::MultipleChoice(n) = self.answer_mode {
            if n < 2 {
                return Err(ConfigurationError::TooFewOptions(n));
            }
        }
        Ok(())
    }

    /// Categories as a comma-separated list (for logs and errors)
    #[must_use]
    pub fn categories_label(&self) -> String {
        self.categories
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Why a session can't start
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Empty category set
    #[error("at least one category must be selected")]
    NoCategories,

    /// Time limit of zero
    #[error("time limit must be positive")]
    NonPositiveTimeLimit,

    /// Round count of zero
    #[error("round count must be positive")]
    NonPositiveRoundCount,

    /// Fewer than two options per round
    #[error("multiple choice needs at least 2 options, got {0}")]
    TooFewOptions(u32),

    /// Nothing to draw after filtering
    #[error("no candidates left in categories {categories}")]
    EmptyPool {
        /// Selected categories
        categories: String,
    },

    /// Not enough distinct names for the option count
    #[error("pool has {available} distinct names but {needed} options were requested")]
    InsufficientPool {
        /// Options per round
        needed: u32,
        /// Distinct names in the pool
        available: usize,
    },
}

/// Errors returned by [`crate::Conductor::play`] before a session runs
#[derive(Debug, Error)]
pub enum SessionError {
    /// Config or pool can't support a session
    #[error("invalid session: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Pool fetch failed
    #[error("could not build the candidate pool: {0}")]
    Catalog(#[from] CatalogError),
}

/// How a session ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Every round was played
    Completed,
    /// A miss ended a sudden-death session
    SuddenDeathLoss,
    /// A fatal failure ended the session
    Error {
        /// What went wrong
        message: String,
    },
    /// The player tore the session down
    Abandoned,
}

impl Outcome {
    /// Whether the session failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Short label for presentation
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::SuddenDeathLoss => "sudden death",
            Self::Error { .. } => "error",
            Self::Abandoned => "abandoned",
        }
    }
}

/// End-screen rating
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    /// Every round right
    Perfect,
    /// 80% or better
    Excellent,
    /// 50% or better
    Good,
    /// Below half
    KeepPracticing,
}

impl Rating {
    /// Rating for a rounded percentage
    #[must_use]
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            100.. => Self::Perfect,
            80..=99 => Self::Excellent,
            50..=79 => Self::Good,
            _ => Self::KeepPracticing,
        }
    }

    /// Summary line shown under the score
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Perfect => "Perfect! You're a true master!",
            Self::Excellent => "Outstanding! Your knowledge runs deep!",
            Self::Good => "Nice! You know quite a lot of them!",
            Self::KeepPracticing => "Keep practicing to become the very best!",
        }
    }
}

/// Terminal report of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Session identifier
    pub session_id: SessionId,
    /// Correct answers
    pub score: u32,
    /// Rounds that reached the reveal
    pub rounds_played: u32,
    /// How it ended
    pub outcome: Outcome,
    /// The config the session ran with
    pub config: SessionConfig,
    /// Names answered correctly, in order
    pub identified: Vec<String>,
    /// When the session reached its terminal state
    pub finished_at: DateTime<Utc>,
}

impl SessionResult {
    /// Score as a rounded percentage of rounds played (0 when none were played)
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.rounds_played == 0 {
            return 0;
        }
        let ratio = f64::from(self.score) / f64::from(self.rounds_played);
        // score <= rounds_played, so the ratio stays within 0..=1
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percentage = (ratio * 100.0).round() as u32;
        percentage
    }

    /// End-screen rating
    #[must_use]
    pub fn rating(&self) -> Rating {
        Rating::from_percentage(self.percentage())
    }
}
