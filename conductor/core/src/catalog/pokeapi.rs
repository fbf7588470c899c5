//! PokeAPI Catalog Implementation
//!
//! Catalog client for the public PokeAPI REST service.
//!
//! # PokeAPI
//!
//! Endpoints used:
//! - `/generation/{id}` - species introduced in a generation
//! - `/pokemon/{id}` - detail (name, artwork, types, height, weight)
//! - `/pokemon-species/{id}` - legendary and mythical flags
//! - `/pokedex/1` - the national index
//!
//! Responses are parsed leniently: absent fields default, and a detail
//! without artwork is reported as [`CatalogError::EntityIncomplete`].

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::traits::{
    CandidatePool, CatalogClient, CatalogError, CategoryId, DexEntry, Entity, EntityRef, Rarity,
};

/// Public PokeAPI endpoint
pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";
/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Default number of rarity lookups in flight
pub const DEFAULT_RARITY_CONCURRENCY: usize = 8;

/// Official artwork for an entity id (used by the collection view)
#[must_use]
pub fn artwork_url(id: u32) -> String {
    format!(
        "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork/{id}.png"
    )
}

/// Connection settings for [`PokeApiCatalog`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSettings {
    /// API root, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Rarity lookups in flight
    pub rarity_concurrency: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rarity_concurrency: DEFAULT_RARITY_CONCURRENCY,
        }
    }
}

/// PokeAPI catalog client
#[derive(Clone)]
pub struct PokeApiCatalog {
    /// API root
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
    /// Rarity lookups in flight
    rarity_concurrency: usize,
}

impl PokeApiCatalog {
    /// Create a client for the given API root
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client can't be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        Self::from_settings(&CatalogSettings {
            base_url: base_url.into(),
            ..CatalogSettings::default()
        })
    }

    /// Create from [`CatalogSettings`]
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client can't be built.
    pub fn from_settings(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http_client,
            rarity_concurrency: settings.rarity_concurrency.max(1),
        })
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generation_url(&self, category: CategoryId) -> String {
        format!("{}/generation/{}", self.base_url, category.0)
    }

    fn pokemon_url(&self, id: u32) -> String {
        format!("{}/pokemon/{id}", self.base_url)
    }

    fn species_url(&self, id: u32) -> String {
        format!("{}/pokemon-species/{id}", self.base_url)
    }

    fn pokedex_url(&self) -> String {
        format!("{}/pokedex/1", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Unavailable(format!("{status} from {url}")));
        }
        Ok(response.json::<T>().await?)
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[async_trait]
impl CatalogClient for PokeApiCatalog {
    fn name(&self) -> &str {
        "PokeAPI"
    }

    async fn fetch_pool(
        &self,
        categories: &BTreeSet<CategoryId>,
    ) -> Result<CandidatePool, CatalogError> {
        let mut references = Vec::new();
        for category in categories {
            let url = self.generation_url(*category);
            let generation: GenerationDto = self.get_json(&url).await?;
            let before = references.len();
            references.extend(
                generation
                    .pokemon_species
                    .into_iter()
                    .filter_map(NamedResource::into_entity_ref),
            );
            tracing::debug!(
                category = category.0,
                species = references.len() - before,
                "Fetched generation"
            );
        }
        references.sort_by_key(|reference| reference.id);
        Ok(CandidatePool::new(references))
    }

    async fn fetch_detail(&self, reference: &EntityRef) -> Result<Entity, CatalogError> {
        let url = self.pokemon_url(reference.id);
        let response = self.http_client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::EntityIncomplete {
                reference: reference.name.clone(),
            });
        }
        if !response.status().is_success() {
            return Err(CatalogError::Unavailable(format!(
                "{} from {url}",
                response.status()
            )));
        }

        let entity = response.json::<PokemonDto>().await?.into_entity();
        if !entity.is_presentable() {
            return Err(CatalogError::EntityIncomplete {
                reference: entity.name,
            });
        }
        Ok(entity)
    }

    async fn fetch_rarity(
        &self,
        references: &[EntityRef],
    ) -> Result<HashMap<u32, Rarity>, CatalogError> {
        let lookups: Vec<(u32, String)> = references
            .iter()
            .map(|reference| (reference.id, self.species_url(reference.id)))
            .collect();
        stream::iter(lookups.into_iter().map(|(id, url)| {
            async move {
                let species: SpeciesDto = self.get_json(&url).await?;
                Ok::<_, CatalogError>((
                    id,
                    Rarity {
                        legendary: species.is_legendary,
                        mythical: species.is_mythical,
                    },
                ))
            }
        }))
        .buffer_unordered(self.rarity_concurrency)
        .try_collect()
        .await
    }

    async fn fetch_dex(&self) -> Result<Vec<DexEntry>, CatalogError> {
        let pokedex: PokedexDto = self.get_json(&self.pokedex_url()).await?;
        let mut entries: Vec<DexEntry> = pokedex
            .pokemon_entries
            .into_iter()
            .map(|entry| DexEntry {
                number: entry.entry_number,
                name: entry.pokemon_species.name,
            })
            .collect();
        entries.sort_by_key(|entry| entry.number);
        Ok(entries)
    }
}

// ============================================
// Wire types
// ============================================

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
    #[serde(default)]
    url: String,
}

impl NamedResource {
    fn into_entity_ref(self) -> Option<EntityRef> {
        match id_from_url(&self.url) {
            Some(id) => Some(EntityRef::new(id, self.name, self.url)),
            None => {
                tracing::warn!(
                    name = %self.name,
                    url = %self.url,
                    "Skipping species without an id"
                );
                None
            }
        }
    }
}

/// Trailing numeric path segment (`.../pokemon-species/25/` gives 25)
fn id_from_url(url: &str) -> Option<u32> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[derive(Debug, Deserialize)]
struct GenerationDto {
    #[serde(default)]
    pokemon_species: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct PokemonDto {
    id: u32,
    name: String,
    #[serde(default)]
    species: Option<NamedResource>,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    weight: u32,
    #[serde(default)]
    types: Vec<TypeSlotDto>,
    #[serde(default)]
    sprites: SpritesDto,
}

impl PokemonDto {
    fn into_entity(self) -> Entity {
        let mut types = self.types;
        types.sort_by_key(|slot| slot.slot);
        let image_url = self
            .sprites
            .other
            .official_artwork
            .front_default
            .or(self.sprites.front_default)
            .filter(|url| !url.trim().is_empty());

        Entity {
            id: self.id,
            // Forms like `deoxys-normal` answer to their species name
            name: self.species.map_or(self.name, |species| species.name),
            image_url,
            types: types.into_iter().map(|slot| slot.kind.name).collect(),
            height_decimeters: self.height,
            weight_decigrams: self.weight,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TypeSlotDto {
    #[serde(default)]
    slot: u8,
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Default, Deserialize)]
struct SpritesDto {
    #[serde(default)]
    front_default: Option<String>,
    #[serde(default)]
    other: OtherSpritesDto,
}

#[derive(Debug, Default, Deserialize)]
struct OtherSpritesDto {
    #[serde(rename = "official-artwork", default)]
    official_artwork: ArtworkDto,
}

#[derive(Debug, Default, Deserialize)]
struct ArtworkDto {
    #[serde(default)]
    front_default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeciesDto {
    #[serde(default)]
    is_legendary: bool,
    #[serde(default)]
    is_mythical: bool,
}

#[derive(Debug, Deserialize)]
struct PokedexDto {
    #[serde(default)]
    pokemon_entries: Vec<PokedexEntryDto>,
}

#[derive(Debug, Deserialize)]
struct PokedexEntryDto {
    entry_number: u32,
    pokemon_species: NamedResource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_urls() {
        let catalog = PokeApiCatalog::new("https://pokeapi.test/api/v2/").unwrap();
        assert_eq!(catalog.base_url(), "https://pokeapi.test/api/v2");
        assert_eq!(
            catalog.generation_url(CategoryId(3)),
            "https://pokeapi.test/api/v2/generation/3"
        );
        assert_eq!(
            catalog.pokemon_url(25),
            "https://pokeapi.test/api/v2/pokemon/25"
        );
        assert_eq!(
            catalog.species_url(25),
            "https://pokeapi.test/api/v2/pokemon-species/25"
        );
        assert_eq!(catalog.pokedex_url(), "https://pokeapi.test/api/v2/pokedex/1");
        assert!(artwork_url(25).ends_with("/official-artwork/25.png"));
    }

    #[test]
    fn test_id_from_url() {
        assert_eq!(
            id_from_url("https://pokeapi.co/api/v2/pokemon-species/25/"),
            Some(25)
        );
        assert_eq!(id_from_url("https://pokeapi.co/api/v2/pokemon-species/151"), Some(151));
        assert_eq!(id_from_url("https://pokeapi.co/api/v2/pokemon-species/"), None);
        assert_eq!(id_from_url(""), None);
    }

    #[test]
    fn test_generation_parse() {
        let json = r#"{
            "id": 1,
            "name": "generation-i",
            "pokemon_species": [
                {"name": "ivysaur", "url": "https://pokeapi.co/api/v2/pokemon-species/2/"},
                {"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon-species/1/"},
                {"name": "broken", "url": "https://pokeapi.co/api/v2/pokemon-species/x/"}
            ]
        }"#;
        let generation: GenerationDto = serde_json::from_str(json).unwrap();
        let refs: Vec<EntityRef> = generation
            .pokemon_species
            .into_iter()
            .filter_map(NamedResource::into_entity_ref)
            .collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, 2);
        assert_eq!(refs[1].name, "bulbasaur");
    }

    #[test]
    fn test_pokemon_parse_prefers_official_artwork() {
        let json = r#"{
            "id": 386,
            "name": "deoxys-normal",
            "height": 17,
            "weight": 608,
            "species": {"name": "deoxys", "url": "https://pokeapi.co/api/v2/pokemon-species/386/"},
            "types": [
                {"slot": 2, "type": {"name": "flying", "url": ""}},
                {"slot": 1, "type": {"name": "psychic", "url": ""}}
            ],
            "sprites": {
                "front_default": "https://img.test/front/386.png",
                "other": {"official-artwork": {"front_default": "https://img.test/art/386.png"}}
            }
        }"#;
        let entity = serde_json::from_str::<PokemonDto>(json).unwrap().into_entity();
        assert_eq!(entity.name, "deoxys");
        assert_eq!(entity.image_url.as_deref(), Some("https://img.test/art/386.png"));
        assert_eq!(entity.types, vec!["psychic".to_string(), "flying".to_string()]);
        assert_eq!(entity.height_decimeters, 17);
        assert_eq!(entity.weight_decigrams, 608);
    }

    #[test]
    fn test_pokemon_parse_tolerates_missing_fields() {
        let json = r#"{
            "id": 10,
            "name": "caterpie",
            "sprites": {"front_default": "https://img.test/front/10.png", "other": {}}
        }"#;
        let entity = serde_json::from_str::<PokemonDto>(json).unwrap().into_entity();
        assert_eq!(entity.name, "caterpie");
        assert_eq!(entity.image_url.as_deref(), Some("https://img.test/front/10.png"));
        assert!(entity.types.is_empty());

        let bare = r#"{"id": 10001, "name": "mystery", "sprites": {"front_default": null}}"#;
        let entity = serde_json::from_str::<PokemonDto>(bare).unwrap().into_entity();
        assert!(!entity.is_presentable());
    }

    #[test]
    fn test_species_and_pokedex_parse() {
        let species: SpeciesDto =
            serde_json::from_str(r#"{"is_legendary": true, "is_mythical": false}"#).unwrap();
        assert!(species.is_legendary);

        let dex: PokedexDto = serde_json::from_str(
            r#"{"pokemon_entries": [
                {"entry_number": 1, "pokemon_species": {"name": "bulbasaur", "url": ""}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(dex.pokemon_entries[0].pokemon_species.name, "bulbasaur");
    }

    #[tokio::test]
    async fn test_rarity_of_nothing_skips_network() {
        let catalog = PokeApiCatalog::new("http://127.0.0.1:9").unwrap();
        let rarity = catalog.fetch_rarity(&[]).await.unwrap();
        assert!(rarity.is_empty());
    }

    #[tokio::test]
    async fn test_rarity_lookup_runs_on_spawned_task() {
        let catalog = std::sync::Arc::new(PokeApiCatalog::new("http://127.0.0.1:9").unwrap());
        let references = vec![
            EntityRef::new(144, "articuno", "http://127.0.0.1:9/pokemon-species/144/"),
            EntityRef::new(145, "zapdos", "http://127.0.0.1:9/pokemon-species/145/"),
        ];

        let handle = tokio::spawn({
            let catalog = std::sync::Arc::clone(&catalog);
            async move { catalog.fetch_rarity(&references).await }
        });

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CatalogError::Unavailable(_))));
    }
}
