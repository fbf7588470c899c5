//! Who's That? - terminal front-end
//!
//! Plays silhouette trivia sessions against PokeAPI and keeps a local
//! high score and collection.
//!
//! # Usage
//!
//! ```bash
//! # Ten rounds from generation 1, four options each
//! whosthat play
//!
//! # Generations 1-3, typed answers, 5 seconds per guess
//! whosthat play -g 1 -g 2 -g 3 --options free --time 5
//!
//! # Everything, no legendaries, first miss ends it
//! whosthat play --all-generations --difficulty filtered --sudden-death
//!
//! # Collection
//! whosthat dex
//! whosthat stats
//!
//! # Verbose logging (stderr)
//! RUST_LOG=debug whosthat play
//! ```

mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use whosthat_core::catalog::{CachedCatalog, CatalogClient, PokeApiCatalog};
use whosthat_core::session::MAX_CATEGORY;
use whosthat_core::store::default_store_path;
use whosthat_core::{
    collection_progress, display_name, load_config_from_path, AnswerMode, CategoryId, Conductor,
    ConfigOverrides, Difficulty, GameConfig, JsonFileStore, PlayerEvent, ProgressStore,
    SessionConfig,
};

use terminal::BellEffects;

/// Who's That? - guess the creature from its silhouette
#[derive(Parser, Debug)]
#[command(name = "whosthat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, env = "WHOSTHAT_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Catalog API base URL
    #[arg(long, value_name = "URL", global = true)]
    catalog_url: Option<String>,

    /// Progress file path
    #[arg(long, value_name = "FILE", global = true)]
    store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "WHOSTHAT_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a session
    Play(PlayArgs),
    /// Show the collection
    Dex {
        /// Only list unlocked entries
        #[arg(long)]
        unlocked: bool,
    },
    /// Show high score and collection progress
    Stats,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Generation to draw from (repeatable)
    #[arg(
        short = 'g',
        long = "generation",
        value_name = "N",
        value_parser = clap::value_parser!(u16).range(1..=i64::from(MAX_CATEGORY))
    )]
    generations: Vec<u16>,

    /// Draw from every generation
    #[arg(long, conflicts_with = "generations")]
    all_generations: bool,

    /// Seconds per guess
    #[arg(short = 't', long = "time", value_name = "SECS")]
    time_limit: Option<u32>,

    /// Number of options, or "free" for typed answers
    #[arg(short = 'o', long = "options", value_name = "N|free")]
    answer_mode: Option<AnswerMode>,

    /// Rounds per session
    #[arg(short = 'r', long, value_name = "N")]
    rounds: Option<u32>,

    /// "normal", or "filtered" to leave out legendary and mythical entries
    #[arg(long, value_name = "LEVEL")]
    difficulty: Option<Difficulty>,

    /// End the session at the first miss
    #[arg(long)]
    sudden_death: bool,

    /// Seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Don't ring the terminal bell
    #[arg(long)]
    quiet: bool,
}

impl PlayArgs {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if self.all_generations {
            overrides =
                overrides.with_categories(SessionConfig::all_categories().into_iter().collect());
        } else if !self.generations.is_empty() {
            overrides = overrides
                .with_categories(self.generations.iter().copied().map(CategoryId).collect());
        }
        if let Some(secs) = self.time_limit {
            overrides = overrides.with_time_limit_secs(secs);
        }
        if let Some(mode) = self.answer_mode {
            overrides = overrides.with_answer_mode(mode);
        }
        if let Some(rounds) = self.rounds {
            overrides = overrides.with_round_count(rounds);
        }
        if let Some(difficulty) = self.difficulty {
            overrides = overrides.with_difficulty(difficulty);
        }
        if self.sudden_death {
            overrides = overrides.with_sudden_death(true);
        }
        if let Some(seed) = self.seed {
            overrides = overrides.with_seed(seed);
        }
        overrides
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they don't interleave with the game on stdout.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("whosthat={level},whosthat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn load(cli: &Cli, play: Option<&PlayArgs>) -> Result<GameConfig> {
    let mut config =
        load_config_from_path(cli.config.clone()).context("Failed to load configuration")?;

    let mut overrides = play.map(PlayArgs::overrides).unwrap_or_default();
    if let Some(url) = &cli.catalog_url {
        overrides = overrides.with_catalog_url(url.clone());
    }
    if let Some(path) = &cli.store {
        overrides = overrides.with_store_path(path.clone());
    }
    overrides.apply(&mut config);

    info!(source = ?config.source(), file = ?config.config_file_path, "Configuration loaded");
    Ok(config)
}

fn open_store(config: &GameConfig) -> Option<ProgressStore> {
    match config.store_path.clone().or_else(default_store_path) {
        Some(path) => {
            info!(path = ?path, "Progress store");
            Some(ProgressStore::new(JsonFileStore::new(path)))
        }
        None => {
            warn!("No data directory found, progress won't be saved");
            None
        }
    }
}

async fn play(config: GameConfig, quiet: bool) -> Result<()> {
    let catalog = PokeApiCatalog::from_settings(&config.catalog)
        .context("Failed to create catalog client")?;
    let catalog = Arc::new(CachedCatalog::new(catalog));

    let (tx, rx) = mpsc::channel(256);
    let (events_tx, events_rx) = mpsc::channel(16);

    let mut conductor = Conductor::with_shared_catalog(catalog, config.conductor.clone(), tx)
        .with_effects(BellEffects::new(!quiet));
    if let Some(store) = open_store(&config) {
        conductor = conductor.with_store(store);
    }

    let renderer = tokio::spawn(terminal::render(rx));
    terminal::spawn_input(config.session.answer_mode, events_tx.clone());

    // Ctrl-C leaves the session instead of killing the process
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = events_tx.send(PlayerEvent::quit()).await;
        }
    });

    let outcome = conductor.play(config.session, events_rx).await;
    drop(conductor);
    renderer.await.context("Renderer task failed")?;

    let result = outcome.context("Could not start the session")?;
    info!(
        session_id = %result.session_id,
        outcome = result.outcome.label(),
        score = result.score,
        rounds = result.rounds_played,
        "Session finished"
    );
    Ok(())
}

async fn dex(config: GameConfig, unlocked_only: bool) -> Result<()> {
    let catalog = PokeApiCatalog::from_settings(&config.catalog)
        .context("Failed to create catalog client")?;
    let entries = catalog
        .fetch_dex()
        .await
        .context("Failed to fetch the national index")?;
    let unlocked = match open_store(&config) {
        Some(store) => store.unlocked().await.context("Failed to read progress")?,
        None => Default::default(),
    };

    let progress = collection_progress(&entries, &unlocked);
    for slot in progress.slots.iter().filter(|slot| slot.unlocked || !unlocked_only) {
        if slot.unlocked {
            println!("#{:04} {}", slot.number, display_name(&slot.name));
        } else {
            println!("#{:04} ???", slot.number);
        }
    }
    println!(
        "{}/{} collected ({}%)",
        progress.unlocked,
        progress.total,
        progress.percentage()
    );
    Ok(())
}

async fn stats(config: GameConfig) -> Result<()> {
    let Some(store) = open_store(&config) else {
        println!("No progress recorded.");
        return Ok(());
    };
    let high_score = store.high_score().await.context("Failed to read high score")?;
    let unlocked = store.unlocked().await.context("Failed to read collection")?;

    println!("High score: {high_score}");
    println!("Collected: {}", unlocked.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match &cli.command {
        Command::Play(args) => {
            let config = load(&cli, Some(args))?;
            play(config, args.quiet).await
        }
        Command::Dex { unlocked } => {
            let config = load(&cli, None)?;
            dex(config, *unlocked).await
        }
        Command::Stats => {
            let config = load(&cli, None)?;
            stats(config).await
        }
    }
}
