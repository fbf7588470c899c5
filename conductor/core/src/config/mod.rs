//! TOML Configuration File Support
//!
//! Centralized configuration loading, supporting a TOML file at
//! `~/.config/whosthat/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`WHOSTHAT_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [catalog]
//! base_url = "https://pokeapi.co/api/v2"
//! request_timeout_secs = 15
//! rarity_concurrency = 8
//!
//! [timing]
//! presentation_delay_ms = 1500
//! reveal_delay_ms = 3000
//! sudden_death_delay_ms = 2000
//! max_selection_attempts = 20
//!
//! [session]
//! categories = [1, 2]
//! time_limit_secs = 10
//! answer_mode = "4"
//! round_count = 10
//! difficulty = "normal"
//! sudden_death = false
//!
//! [store]
//! path = "/home/ash/.local/share/whosthat/progress.json"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogSettings, CategoryId};
use crate::conductor::ConductorConfig;
use crate::session::{AnswerMode, Difficulty, SessionConfig};
use crate::store::default_store_path;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Catalog section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogToml {
    /// API root
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Rarity lookups in flight
    pub rarity_concurrency: Option<usize>,
}

/// Timing section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingToml {
    /// Presenting -> Guessing delay in milliseconds
    pub presentation_delay_ms: Option<u64>,

    /// Reveal duration in milliseconds
    pub reveal_delay_ms: Option<u64>,

    /// Delay before a sudden-death loss ends the session, in milliseconds
    pub sudden_death_delay_ms: Option<u64>,

    /// Unusable entities tolerated per round
    pub max_selection_attempts: Option<u32>,
}

/// Session defaults section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Generation numbers
    pub categories: Option<Vec<u16>>,

    /// Seconds per round
    pub time_limit_secs: Option<u32>,

    /// Option count ("2", "4", ...) or "free"
    pub answer_mode: Option<String>,

    /// Rounds per session
    pub round_count: Option<u32>,

    /// "normal" or "filtered"
    pub difficulty: Option<String>,

    /// First miss ends the session
    pub sudden_death: Option<bool>,
}

/// Store section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreToml {
    /// Progress file location
    pub path: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameToml {
    /// Catalog configuration section
    pub catalog: CatalogToml,

    /// Timing configuration section
    pub timing: TimingToml,

    /// Session defaults section
    pub session: SessionToml,

    /// Store configuration section
    pub store: StoreToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration for the game
///
/// Use [`load_config`] to load with proper priority handling.
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Catalog connection settings
    pub catalog: CatalogSettings,

    /// Conductor timing and selection settings
    pub conductor: ConductorConfig,

    /// Session defaults offered by the setup screen
    pub session: SessionConfig,

    /// Progress file (none disables recording)
    pub store_path: Option<PathBuf>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogSettings::default(),
            conductor: ConductorConfig::default(),
            session: SessionConfig::default(),
            store_path: default_store_path(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl GameConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values no later stage would catch
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "catalog.base_url must not be empty".to_string(),
            ));
        }
        if self.catalog.rarity_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "catalog.rarity_concurrency must be positive".to_string(),
            ));
        }
        if self.conductor.max_selection_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "timing.max_selection_attempts must be positive".to_string(),
            ));
        }
        self.session
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("session: {e}")))
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/whosthat/config.toml` or
/// `~/.config/whosthat/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("whosthat").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or a
/// value is invalid. A missing config file is not an error.
pub fn load_config() -> Result<GameConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only
///   defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or a value is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<GameConfig, ConfigError> {
    let mut config = GameConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: GameToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

fn parse_answer_mode(raw: &str) -> Result<AnswerMode, ConfigError> {
    raw.parse().map_err(ConfigError::ValidationError)
}

fn parse_difficulty(raw: &str) -> Result<Difficulty, ConfigError> {
    raw.parse().map_err(ConfigError::ValidationError)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut GameConfig, toml: &GameToml) -> Result<(), ConfigError> {
    // Catalog settings
    if let Some(ref url) = toml.catalog.base_url {
        config.catalog.base_url = url.clone();
    }
    if let Some(secs) = toml.catalog.request_timeout_secs {
        config.catalog.request_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = toml.catalog.rarity_concurrency {
        config.catalog.rarity_concurrency = n;
    }

    // Timing settings
    if let Some(ms) = toml.timing.presentation_delay_ms {
        config.conductor.presentation_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.timing.reveal_delay_ms {
        config.conductor.reveal_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.timing.sudden_death_delay_ms {
        config.conductor.sudden_death_delay = Duration::from_millis(ms);
    }
    if let Some(n) = toml.timing.max_selection_attempts {
        config.conductor.max_selection_attempts = n;
    }

    // Session defaults
    if let Some(ref categories) = toml.session.categories {
        config.session.categories = categories.iter().copied().map(CategoryId).collect();
    }
    if let Some(secs) = toml.session.time_limit_secs {
        config.session.time_limit_secs = secs;
    }
    if let Some(ref mode) = toml.session.answer_mode {
        config.session.answer_mode = parse_answer_mode(mode)?;
    }
    if let Some(rounds) = toml.session.round_count {
        config.session.round_count = rounds;
    }
    if let Some(ref difficulty) = toml.session.difficulty {
        config.session.difficulty = parse_difficulty(difficulty)?;
    }
    if let Some(enabled) = toml.session.sudden_death {
        config.session.sudden_death = enabled;
    }

    // Store settings
    if let Some(ref path) = toml.store.path {
        config.store_path = Some(path.clone());
    }

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut GameConfig) {
    if let Ok(url) = std::env::var("WHOSTHAT_CATALOG_URL") {
        config.catalog.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("WHOSTHAT_REQUEST_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.catalog.request_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(concurrency) = std::env::var("WHOSTHAT_RARITY_CONCURRENCY") {
        if let Ok(n) = concurrency.parse::<usize>() {
            config.catalog.rarity_concurrency = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(delay) = std::env::var("WHOSTHAT_PRESENTATION_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.conductor.presentation_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(delay) = std::env::var("WHOSTHAT_REVEAL_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.conductor.reveal_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(delay) = std::env::var("WHOSTHAT_SUDDEN_DEATH_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.conductor.sudden_death_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(attempts) = std::env::var("WHOSTHAT_MAX_SELECTION_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<u32>() {
            config.conductor.max_selection_attempts = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(seed) = std::env::var("WHOSTHAT_SEED") {
        if let Ok(seed) = seed.parse::<u64>() {
            config.conductor.seed = Some(seed);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(path) = std::env::var("WHOSTHAT_STORE_PATH") {
        config.store_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Categories override
    pub categories: Option<Vec<CategoryId>>,

    /// Time limit override (seconds)
    pub time_limit_secs: Option<u32>,

    /// Answer mode override
    pub answer_mode: Option<AnswerMode>,

    /// Round count override
    pub round_count: Option<u32>,

    /// Difficulty override
    pub difficulty: Option<Difficulty>,

    /// Sudden death override
    pub sudden_death: Option<bool>,

    /// Catalog URL override
    pub catalog_url: Option<String>,

    /// Store path override
    pub store_path: Option<PathBuf>,

    /// RNG seed override
    pub seed: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override categories
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<CategoryId>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Override the time limit
    #[must_use]
    pub fn with_time_limit_secs(mut self, secs: u32) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    /// Override the answer mode
    #[must_use]
    pub fn with_answer_mode(mut self, mode: AnswerMode) -> Self {
        self.answer_mode = Some(mode);
        self
    }

    /// Override the round count
    #[must_use]
    pub fn with_round_count(mut self, rounds: u32) -> Self {
        self.round_count = Some(rounds);
        self
    }

    /// Override the difficulty
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Override sudden death
    #[must_use]
    pub fn with_sudden_death(mut self, enabled: bool) -> Self {
        self.sudden_death = Some(enabled);
        self
    }

    /// Override the catalog URL
    #[must_use]
    pub fn with_catalog_url(mut self, url: String) -> Self {
        self.catalog_url = Some(url);
        self
    }

    /// Override the progress file
    #[must_use]
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    /// Fix the random sequence
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn is_empty(&self) -> bool {
        self.categories.is_none()
            && self.time_limit_secs.is_none()
            && self.answer_mode.is_none()
            && self.round_count.is_none()
            && self.difficulty.is_none()
            && self.sudden_death.is_none()
            && self.catalog_url.is_none()
            && self.store_path.is_none()
            && self.seed.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut GameConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref categories) = self.categories {
            config.session.categories = categories.iter().copied().collect();
        }
        if let Some(secs) = self.time_limit_secs {
            config.session.time_limit_secs = secs;
        }
        if let Some(mode) = self.answer_mode {
            config.session.answer_mode = mode;
        }
        if let Some(rounds) = self.round_count {
            config.session.round_count = rounds;
        }
        if let Some(difficulty) = self.difficulty {
            config.session.difficulty = difficulty;
        }
        if let Some(enabled) = self.sudden_death {
            config.session.sudden_death = enabled;
        }
        if let Some(ref url) = self.catalog_url {
            config.catalog.base_url = url.clone();
        }
        if let Some(ref path) = self.store_path {
            config.store_path = Some(path.clone());
        }
        if let Some(seed) = self.seed {
            config.conductor.seed = Some(seed);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
