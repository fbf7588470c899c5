//! Catalog Traits
//!
//! Trait and data definitions for the remote catalog that supplies quiz
//! entities. The Conductor only ever talks to [`CatalogClient`], so the
//! HTTP adapter, the in-memory catalog and the caching wrapper are
//! interchangeable.
//!
//! # Design Philosophy
//!
//! The catalog is pure I/O. It lists candidate references per category,
//! resolves a reference into a full [`Entity`], and optionally reports
//! rarity flags. Deciding what to do with an incomplete entity is the
//! session's job, not the catalog's.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answer::normalize_name;

/// Category identifier (a generation number for the PokeAPI catalog)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u16);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lightweight reference to an entity in the catalog
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Catalog identifier
    pub id: u32,
    /// Canonical name (the answer key)
    pub name: String,
    /// Where the catalog lists this entity
    pub url: String,
}

impl EntityRef {
    /// Create a new reference
    pub fn new(id: u32, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A fully fetched quiz entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Catalog identifier
    pub id: u32,
    /// Canonical name (the answer key)
    pub name: String,
    /// Artwork used for the silhouette, absent when the catalog has none
    pub image_url: Option<String>,
    /// Type tags in slot order
    pub types: Vec<String>,
    /// Height in decimeters
    pub height_decimeters: u32,
    /// Weight in decigrams
    pub weight_decigrams: u32,
}

impl Entity {
    /// Whether the entity carries the media needed to present a round
    #[must_use]
    pub fn is_presentable(&self) -> bool {
        self.image_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Height in meters
    #[must_use]
    pub fn height_meters(&self) -> f64 {
        f64::from(self.height_decimeters) / 10.0
    }

    /// Weight in kilograms
    #[must_use]
    pub fn weight_kilograms(&self) -> f64 {
        f64::from(self.weight_decigrams) / 10.0
    }
}

/// Rarity flags used by the filtered difficulty
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rarity {
    /// Legendary entity
    pub legendary: bool,
    /// Mythical entity
    pub mythical: bool,
}

impl Rarity {
    /// Whether the filtered difficulty excludes this entity
    #[must_use]
    pub fn is_rare(&self) -> bool {
        self.legendary || self.mythical
    }
}

/// One slot of the national index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexEntry {
    /// Entry number in the national index
    pub number: u32,
    /// Canonical name
    pub name: String,
}

/// Ordered set of references eligible for a session
///
/// Built once when the session starts and read-only afterwards.
/// Duplicate ids are dropped, first occurrence wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePool {
    entries: Vec<EntityRef>,
}

impl CandidatePool {
    /// Build a pool from references
    pub fn new(entries: impl IntoIterator<Item = EntityRef>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.id))
            .collect();
        Self { entries }
    }

    /// All references in pool order
    #[must_use]
    pub fn entries(&self) -> &[EntityRef] {
        &self.entries
    }

    /// Number of references
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no references
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct names after answer normalization
    #[must_use]
    pub fn distinct_names(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| normalize_name(&entry.name))
            .collect::<HashSet<_>>()
            .len()
    }

    /// Drop every reference the rarity map marks as rare
    #[must_use]
    pub fn without_rare(self, rarity: &HashMap<u32, Rarity>) -> Self {
        let entries = self
            .entries
            .into_iter()
            .filter(|entry| !rarity.get(&entry.id).is_some_and(Rarity::is_rare))
            .collect();
        Self { entries }
    }
}

/// Catalog failures
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Network, HTTP status or parse failure
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The entity exists but lacks the media a round needs
    #[error("entity '{reference}' is missing required media")]
    EntityIncomplete {
        /// Name or id of the offending entity
        reference: String,
    },
}

/// Catalog client trait
///
/// Implement this trait to plug a different data source into the Conductor.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Get the catalog name (e.g., "PokeAPI")
    fn name(&self) -> &str;

    /// List the references of every entity in the given categories
    async fn fetch_pool(
        &self,
        categories: &BTreeSet<CategoryId>,
    ) -> Result<CandidatePool, CatalogError>;

    /// Resolve a reference into a full entity
    async fn fetch_detail(&self, reference: &EntityRef) -> Result<Entity, CatalogError>;

    /// Rarity flags keyed by entity id
    async fn fetch_rarity(
        &self,
        references: &[EntityRef],
    ) -> Result<HashMap<u32, Rarity>, CatalogError>;

    /// The national index, sorted by entry number
    async fn fetch_dex(&self) -> Result<Vec<DexEntry>, CatalogError>;

    /// Pool for the filtered difficulty (legendary and mythical entities removed)
    async fn fetch_common_pool(
        &self,
        categories: &BTreeSet<CategoryId>,
    ) -> Result<CandidatePool, CatalogError> {
        let pool = self.fetch_pool(categories).await?;
        let rarity = self.fetch_rarity(pool.entries()).await?;
        let before = pool.len();
        let pool = pool.without_rare(&rarity);
        tracing::debug!(
            catalog = self.name(),
            before,
            after = pool.len(),
            "Filtered rare entities from pool"
        );
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(id: u32, name: &str) -> EntityRef {
        EntityRef::new(id, name, format!("https://catalog.test/{id}"))
    }

    #[test]
    fn test_pool_drops_duplicate_ids() {
        let pool = CandidatePool::new(vec![
            reference(1, "bulbasaur"),
            reference(2, "ivysaur"),
            reference(1, "bulbasaur"),
        ]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.entries()[1].name, "ivysaur");
    }

    #[test]
    fn test_distinct_names_normalizes() {
        let pool = CandidatePool::new(vec![
            reference(122, "mr-mime"),
            reference(9122, "Mr. Mime"),
            reference(25, "pikachu"),
        ]);
        assert_eq!(pool.distinct_names(), 2);
    }

    #[test]
    fn test_without_rare() {
        let pool = CandidatePool::new(vec![
            reference(144, "articuno"),
            reference(151, "mew"),
            reference(19, "rattata"),
        ]);
        let rarity = HashMap::from([
            (
                144,
                Rarity {
                    legendary: true,
                    mythical: false,
                },
            ),
            (
                151,
                Rarity {
                    legendary: false,
                    mythical: true,
                },
            ),
        ]);

        let pool = pool.without_rare(&rarity);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.entries()[0].name, "rattata");
    }

    #[test]
    fn test_entity_presentable() {
        let mut entity = Entity {
            id: 25,
            name: "pikachu".to_string(),
            image_url: Some("https://img.test/25.png".to_string()),
            types: vec!["electric".to_string()],
            height_decimeters: 4,
            weight_decigrams: 60,
        };
        assert!(entity.is_presentable());
        assert!((entity.height_meters() - 0.4).abs() < f64::EPSILON);
        assert!((entity.weight_kilograms() - 6.0).abs() < f64::EPSILON);

        entity.image_url = Some("  ".to_string());
        assert!(!entity.is_presentable());
        entity.image_url = None;
        assert!(!entity.is_presentable());
    }
}
