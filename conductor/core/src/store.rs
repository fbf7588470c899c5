//! Progress Store
//!
//! Best score and the collection of entities ever identified, kept in a
//! flat string key-value store.
//!
//! # Keys
//!
//! - `highScore` - decimal string
//! - `unlockedEntries` - JSON array of names
//!
//! Store failures never end a session. The Conductor logs them and tells
//! the player their progress wasn't saved.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{artwork_url, DexEntry};
use crate::session::SessionResult;

/// Key holding the best score
pub const HIGH_SCORE_KEY: &str = "highScore";
/// Key holding the identified names
pub const UNLOCKED_KEY: &str = "unlockedEntries";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage can't be reached at all
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// File access failed
    #[error("failed to access {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A stored value doesn't parse
    #[error("corrupt value under '{key}': {reason}")]
    Corrupt {
        /// Offending key
        key: String,
        /// Parse failure
        reason: String,
    },

    /// Contents couldn't be serialized
    #[error("failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value under `key`, `None` when unset
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

// ============================================
// Memory store
// ============================================

/// Store kept in memory (tests, or a front-end with no disk)
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    disabled: bool,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails every call
    pub fn disabled() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            disabled: true,
        }
    }

    /// Seed a value
    #[must_use]
    pub fn with_value(self, key: &str, value: impl Into<String>) -> Self {
        self.values.write().insert(key.to_string(), value.into());
        self
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.disabled {
            Err(StoreError::Unavailable("storage is disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.check()?;
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================
// JSON file store
// ============================================

/// Store persisted as one JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Store backed by `path` (created on first write)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }
        let contents = serde_json::to_string_pretty(values)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value);
        self.save(&values).await
    }
}

/// Default location of the progress file
#[must_use]
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("whosthat").join("progress.json"))
}

// ============================================
// Progress
// ============================================

/// What recording a session changed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Best score after recording
    pub high_score: u32,
    /// Whether this session set it
    pub new_high_score: bool,
    /// Names that were not in the collection before
    pub newly_unlocked: Vec<String>,
}

/// High score and collection on top of a [`KeyValueStore`]
#[derive(Clone)]
pub struct ProgressStore {
    inner: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    /// Progress on top of `store`
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Best score so far (0 when none is stored)
    ///
    /// # Errors
    ///
    /// Fails when the store is unreachable or the value isn't a number.
    pub async fn high_score(&self) -> Result<u32, StoreError> {
        match self.inner.get(HIGH_SCORE_KEY).await? {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| StoreError::Corrupt {
                key: HIGH_SCORE_KEY.to_string(),
                reason: format!("'{raw}' is not a score"),
            }),
        }
    }

    /// Every name ever identified
    ///
    /// # Errors
    ///
    /// Fails when the store is unreachable or the value isn't a JSON array.
    pub async fn unlocked(&self) -> Result<BTreeSet<String>, StoreError> {
        match self.inner.get(UNLOCKED_KEY).await? {
            None => Ok(BTreeSet::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: UNLOCKED_KEY.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Fold a finished session into the stored progress
    ///
    /// The score is written only when it beats the stored one, the
    /// collection only when it grows.
    ///
    /// # Errors
    ///
    /// Fails on any store error; nothing after the failing step is written.
    pub async fn record(&self, result: &SessionResult) -> Result<RecordOutcome, StoreError> {
        let previous = self.high_score().await?;
        let new_high_score = result.score > previous;
        if new_high_score {
            self.inner
                .set(HIGH_SCORE_KEY, result.score.to_string())
                .await?;
        }

        let mut unlocked = self.unlocked().await?;
        let newly_unlocked: Vec<String> = result
            .identified
            .iter()
            .filter(|name| unlocked.insert((*name).clone()))
            .cloned()
            .collect();
        if !newly_unlocked.is_empty() {
            self.inner
                .set(UNLOCKED_KEY, serde_json::to_string(&unlocked)?)
                .await?;
        }

        tracing::debug!(
            session_id = %result.session_id,
            high_score = previous.max(result.score),
            new_high_score,
            newly_unlocked = newly_unlocked.len(),
            "Recorded progress"
        );

        Ok(RecordOutcome {
            high_score: previous.max(result.score),
            new_high_score,
            newly_unlocked,
        })
    }
}

/// One slot of the collection view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSlot {
    /// National index number
    pub number: u32,
    /// Answer key
    pub name: String,
    /// Identified at least once
    pub unlocked: bool,
    /// Artwork to show (silhouetted while locked)
    pub image_url: String,
}

/// The collection view: every dex slot and whether it's unlocked
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionProgress {
    /// Unlocked slots
    pub unlocked: usize,
    /// All slots
    pub total: usize,
    /// Every slot in index order
    pub slots: Vec<CollectionSlot>,
}

impl CollectionProgress {
    /// Unlocked share as a rounded percentage
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        u32::try_from(self.unlocked * 100 / self.total).unwrap_or(100)
    }
}

/// Match the national index against the unlocked names
#[must_use]
pub fn collection_progress(dex: &[DexEntry], unlocked: &BTreeSet<String>) -> CollectionProgress {
    let slots: Vec<CollectionSlot> = dex
        .iter()
        .map(|entry| CollectionSlot {
            number: entry.number,
            name: entry.name.clone(),
            unlocked: unlocked.contains(&entry.name),
            image_url: artwork_url(entry.number),
        })
        .collect();
    CollectionProgress {
        unlocked: slots.iter().filter(|slot| slot.unlocked).count(),
        total: slots.len(),
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SessionId;
    use crate::session::{Outcome, SessionConfig};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn result(score: u32, identified: &[&str]) -> SessionResult {
        SessionResult {
            session_id: SessionId::new(),
            score,
            rounds_played: 5,
            outcome: Outcome::Completed,
            config: SessionConfig::default(),
            identified: identified.iter().map(ToString::to_string).collect(),
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_store_defaults() {
        let progress = ProgressStore::new(MemoryStore::new());
        assert_eq!(progress.high_score().await.unwrap(), 0);
        assert!(progress.unlocked().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_updates_high_score_only_when_beaten() {
        let progress = ProgressStore::new(MemoryStore::new().with_value(HIGH_SCORE_KEY, "3"));

        let outcome = progress.record(&result(2, &[])).await.unwrap();
        assert_eq!(outcome.high_score, 3);
        assert!(!outcome.new_high_score);

        let outcome = progress.record(&result(4, &[])).await.unwrap();
        assert_eq!(outcome.high_score, 4);
        assert!(outcome.new_high_score);
        assert_eq!(progress.high_score().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_record_unions_collection() {
        let progress = ProgressStore::new(
            MemoryStore::new().with_value(UNLOCKED_KEY, r#"["bulbasaur"]"#),
        );

        let outcome = progress
            .record(&result(2, &["bulbasaur", "pikachu"]))
            .await
            .unwrap();
        assert_eq!(outcome.newly_unlocked, vec!["pikachu".to_string()]);
        assert_eq!(
            progress.unlocked().await.unwrap(),
            BTreeSet::from(["bulbasaur".to_string(), "pikachu".to_string()])
        );
    }

    #[tokio::test]
    async fn test_disabled_store_fails() {
        let progress = ProgressStore::new(MemoryStore::disabled());
        assert!(matches!(
            progress.record(&result(1, &["eevee"])).await,
            Err(StoreError::Unavailable(_))
        ));
        tokio_test::assert_err!(progress.unlocked().await);
    }

    #[test]
    fn test_memory_store_seeded_values() {
        let store = MemoryStore::new().with_value(UNLOCKED_KEY, r#"["mew"]"#);
        let progress = ProgressStore::new(store);
        let unlocked = tokio_test::block_on(progress.unlocked());
        assert_eq!(
            tokio_test::assert_ok!(unlocked),
            BTreeSet::from(["mew".to_string()])
        );
        assert_eq!(tokio_test::block_on(progress.high_score()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_high_score() {
        let progress = ProgressStore::new(MemoryStore::new().with_value(HIGH_SCORE_KEY, "many"));
        assert!(matches!(
            progress.high_score().await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_json_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(HIGH_SCORE_KEY).await.unwrap(), None);
        store.set(HIGH_SCORE_KEY, "7".to_string()).await.unwrap();
        store.set(UNLOCKED_KEY, "[]".to_string()).await.unwrap();

        let reopened = ProgressStore::new(JsonFileStore::new(&path));
        assert_eq!(reopened.high_score().await.unwrap(), 7);
        assert!(reopened.unlocked().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get(HIGH_SCORE_KEY).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_collection_progress() {
        let dex = vec![
            DexEntry {
                number: 1,
                name: "bulbasaur".to_string(),
            },
            DexEntry {
                number: 2,
                name: "ivysaur".to_string(),
            },
            DexEntry {
                number: 3,
                name: "venusaur".to_string(),
            },
        ];
        let unlocked = BTreeSet::from(["ivysaur".to_string(), "mew".to_string()]);

        let progress = collection_progress(&dex, &unlocked);
        assert_eq!(progress.unlocked, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.percentage(), 33);
        assert!(progress.slots[1].unlocked);
        assert!(!progress.slots[0].unlocked);
        assert!(progress.slots[2].image_url.ends_with("/3.png"));
    }
}
