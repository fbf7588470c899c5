//! Catalog Integration
//!
//! Abstracted access to the remote entity catalog through a common trait.
//!
//! # Available Catalogs
//!
//! - **PokeAPI**: the public REST service (default)
//! - **In-memory**: fixed entity list for tests and offline runs
//! - **Cached**: memoizing wrapper around either of the above
//!
//! # Usage
//!
//! ```ignore
//! use whosthat_core::catalog::{CachedCatalog, CatalogClient, PokeApiCatalog};
//!
//! let catalog = CachedCatalog::new(PokeApiCatalog::new(DEFAULT_BASE_URL)?);
//! let pool = catalog.fetch_pool(&categories).await?;
//! ```

mod cache;
mod memory;
mod pokeapi;
mod traits;

pub use cache::{CacheStats, CachedCatalog};
pub use memory::InMemoryCatalog;
pub use pokeapi::{
    artwork_url, CatalogSettings, PokeApiCatalog, DEFAULT_BASE_URL, DEFAULT_RARITY_CONCURRENCY,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use traits::{
    CandidatePool, CatalogClient, CatalogError, CategoryId, DexEntry, Entity, EntityRef, Rarity,
};
