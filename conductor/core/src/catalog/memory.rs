//! In-memory catalog
//!
//! A fixed set of entities held in memory, with fetch counters and failure
//! switches. Used by tests and by anything that wants to drive the
//! Conductor without a network.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{
    CandidatePool, CatalogClient, CatalogError, CategoryId, DexEntry, Entity, EntityRef, Rarity,
};

#[derive(Clone, Debug)]
struct Record {
    category: CategoryId,
    entity: Entity,
    rarity: Rarity,
}

/// Catalog backed by a fixed list of entities
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: Vec<Record>,
    fail_pools: bool,
    fail_details_after: Option<usize>,
    detail_delay: Option<Duration>,
    pool_fetches: AtomicUsize,
    detail_fetches: AtomicUsize,
    rarity_lookups: AtomicUsize,
}

impl InMemoryCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Artwork URL the catalog assigns to an id
    #[must_use]
    pub fn image_for(id: u32) -> String {
        format!("memory://artwork/{id}.png")
    }

    fn push(mut self, category: CategoryId, entity: Entity, rarity: Rarity) -> Self {
        self.records.push(Record {
            category,
            entity,
            rarity,
        });
        self
    }

    fn build(id: u32, name: &str) -> Entity {
        Entity {
            id,
            name: name.to_string(),
            image_url: Some(Self::image_for(id)),
            types: vec!["normal".to_string()],
            height_decimeters: 10,
            weight_decigrams: 100,
        }
    }

    /// Add a common entity with artwork
    #[must_use]
    pub fn with_entity(self, category: CategoryId, id: u32, name: &str) -> Self {
        self.push(category, Self::build(id, name), Rarity::default())
    }

    /// Add a legendary entity with artwork
    #[must_use]
    pub fn with_legendary(self, category: CategoryId, id: u32, name: &str) -> Self {
        let rarity = Rarity {
            legendary: true,
            mythical: false,
        };
        self.push(category, Self::build(id, name), rarity)
    }

    /// Add an entity whose detail has no artwork
    #[must_use]
    pub fn with_incomplete(self, category: CategoryId, id: u32, name: &str) -> Self {
        let mut entity = Self::build(id, name);
        entity.image_url = None;
        self.push(category, entity, Rarity::default())
    }

    /// Every pool fetch fails
    #[must_use]
    pub fn failing_pools(mut self) -> Self {
        self.fail_pools = true;
        self
    }

    /// Detail fetches fail once `count` have succeeded
    #[must_use]
    pub fn failing_details_after(mut self, count: usize) -> Self {
        self.fail_details_after = Some(count);
        self
    }

    /// Detail fetches take this long
    #[must_use]
    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    /// Every entity, in insertion order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.records.iter().map(|record| &record.entity)
    }

    /// Name of the entity shown with the given artwork
    #[must_use]
    pub fn name_for_image(&self, image_url: &str) -> Option<String> {
        self.entities()
            .find(|entity| entity.image_url.as_deref() == Some(image_url))
            .map(|entity| entity.name.clone())
    }

    /// Pool fetches so far
    #[must_use]
    pub fn pool_fetches(&self) -> usize {
        self.pool_fetches.load(Ordering::SeqCst)
    }

    /// Detail fetches so far, failed ones included
    #[must_use]
    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }

    /// References looked up for rarity
    #[must_use]
    pub fn rarity_lookups(&self) -> usize {
        self.rarity_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn fetch_pool(
        &self,
        categories: &BTreeSet<CategoryId>,
    ) -> Result<CandidatePool, CatalogError> {
        self.pool_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_pools {
            return Err(CatalogError::Unavailable("pool listing failed".to_string()));
        }
        Ok(CandidatePool::new(
            self.records
                .iter()
                .filter(|record| categories.contains(&record.category))
                .map(|record| {
                    EntityRef::new(
                        record.entity.id,
                        record.entity.name.clone(),
                        format!("memory://entity/{}", record.entity.id),
                    )
                }),
        ))
    }

    async fn fetch_detail(&self, reference: &EntityRef) -> Result<Entity, CatalogError> {
        let succeeded = self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.detail_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_details_after.is_some_and(|limit| succeeded >= limit) {
            return Err(CatalogError::Unavailable(format!(
                "detail for {} failed",
                reference.name
            )));
        }
        self.records
            .iter()
            .find(|record| record.entity.id == reference.id)
            .map(|record| record.entity.clone())
            .ok_or_else(|| CatalogError::EntityIncomplete {
                reference: reference.name.clone(),
            })
    }

    async fn fetch_rarity(
        &self,
        references: &[EntityRef],
    ) -> Result<HashMap<u32, Rarity>, CatalogError> {
        self.rarity_lookups
            .fetch_add(references.len(), Ordering::SeqCst);
        Ok(references
            .iter()
            .filter_map(|reference| {
                self.records
                    .iter()
                    .find(|record| record.entity.id == reference.id)
                    .map(|record| (reference.id, record.rarity))
            })
            .collect())
    }

    async fn fetch_dex(&self) -> Result<Vec<DexEntry>, CatalogError> {
        let mut dex: Vec<DexEntry> = self
            .records
            .iter()
            .map(|record| DexEntry {
                number: record.entity.id,
                name: record.entity.name.clone(),
            })
            .collect();
        dex.sort_by_key(|entry| entry.number);
        Ok(dex)
    }
}
