//! Catalog caching
//!
//! Wraps any [`CatalogClient`] and memoizes what doesn't change between
//! sessions: the species list of each category, rarity flags per entity,
//! fetched details and the national index. One `CachedCatalog` is meant to
//! be shared by every session a process runs.
//!
//! Failures are never cached.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::traits::{
    CandidatePool, CatalogClient, CatalogError, CategoryId, DexEntry, Entity, EntityRef, Rarity,
};

/// Memoizing catalog wrapper
pub struct CachedCatalog<C> {
    inner: C,
    pools: DashMap<CategoryId, Vec<EntityRef>>,
    rarity: DashMap<u32, Rarity>,
    details: DashMap<u32, Entity>,
    dex: RwLock<Option<Vec<DexEntry>>>,
}

/// Cache occupancy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Categories with a cached pool
    pub categories: usize,
    /// Cached rarity lookups
    pub rarity_entries: usize,
    /// Cached entity details
    pub details: usize,
    /// Whether the national index is cached
    pub dex_cached: bool,
}

impl<C: CatalogClient> CachedCatalog<C> {
    /// Wrap a catalog with empty caches
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            pools: DashMap::new(),
            rarity: DashMap::new(),
            details: DashMap::new(),
            dex: RwLock::new(None),
        }
    }

    /// The wrapped client
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Current cache sizes
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            categories: self.pools.len(),
            rarity_entries: self.rarity.len(),
            details: self.details.len(),
            dex_cached: self.dex.read().is_some(),
        }
    }

    /// Forget everything
    pub fn clear(&self) {
        self.pools.clear();
        self.rarity.clear();
        self.details.clear();
        *self.dex.write() = None;
    }
}

#[async_trait]
impl<C: CatalogClient> CatalogClient for CachedCatalog<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_pool(
        &self,
        categories: &BTreeSet<CategoryId>,
    ) -> Result<CandidatePool, CatalogError> {
        let mut references = Vec::new();
        for category in categories {
            let cached = self.pools.get(category).map(|entry| entry.value().clone());
            let entries = match cached {
                Some(entries) => entries,
                None => {
                    let pool = self.inner.fetch_pool(&BTreeSet::from([*category])).await?;
                    let entries = pool.entries().to_vec();
                    self.pools.insert(*category, entries.clone());
                    tracing::debug!(
                        category = category.0,
                        size = entries.len(),
                        "Cached category pool"
                    );
                    entries
                }
            };
            references.extend(entries);
        }
        references.sort_by_key(|reference| reference.id);
        Ok(CandidatePool::new(references))
    }

    async fn fetch_detail(&self, reference: &EntityRef) -> Result<Entity, CatalogError> {
        let cached = self.details.get(&reference.id).map(|entry| entry.value().clone());
        if let Some(entity) = cached {
            return Ok(entity);
        }
        let entity = self.inner.fetch_detail(reference).await?;
        self.details.insert(reference.id, entity.clone());
        Ok(entity)
    }

    async fn fetch_rarity(
        &self,
        references: &[EntityRef],
    ) -> Result<HashMap<u32, Rarity>, CatalogError> {
        let missing: Vec<EntityRef> = references
            .iter()
            .filter(|reference| !self.rarity.contains_key(&reference.id))
            .cloned()
            .collect();

        if !missing.is_empty() {
            let fetched = self.inner.fetch_rarity(&missing).await?;
            tracing::debug!(fetched = fetched.len(), "Cached rarity flags");
            for (id, rarity) in fetched {
                self.rarity.insert(id, rarity);
            }
        }

        Ok(references
            .iter()
            .filter_map(|reference| {
                self.rarity
                    .get(&reference.id)
                    .map(|rarity| (reference.id, *rarity.value()))
            })
            .collect())
    }

    async fn fetch_dex(&self) -> Result<Vec<DexEntry>, CatalogError> {
        let cached = self.dex.read().clone();
        if let Some(dex) = cached {
            return Ok(dex);
        }
        let dex = self.inner.fetch_dex().await?;
        *self.dex.write() = Some(dex.clone());
        Ok(dex)
    }
}
