//! Company directory loading, caching, and filtering.
//!
//! [`EntitySource`] abstracts the directory fetch; [`EntityCatalog`] adds a
//! file-backed cache with a freshness window so repeated job starts do not
//! refetch the directory.

use crate::Entity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod dart;

pub use dart::DartEntitySource;

/// Catalog errors (load failures are startup errors: the job never starts)
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The directory endpoint returned something other than a ZIP archive,
    /// typically an authentication rejection body
    #[error("directory payload is not a ZIP archive: {0}")]
    NotZip(String),

    /// ZIP extraction failure
    #[error("archive error: {0}")]
    Archive(String),

    /// XML payload could not be parsed
    #[error("malformed directory payload: {0}")]
    Malformed(String),

    /// The source returned success with zero entities; an empty company
    /// universe is treated as an error-equivalent, not a valid catalog
    #[error("directory loaded successfully but contained no entities")]
    Empty,

    /// Cache file I/O failure
    #[error("IO error: {0}")]
    Io(String),
}

/// Abstract company-directory source.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Load the full entity directory using `credential`.
    async fn load(&self, credential: &str) -> Result<Vec<Entity>, CatalogError>;
}

/// Listing-marker filter applied to the loaded directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    /// Companies with a stock code
    Listed,
    /// Companies without a stock code
    Unlisted,
    /// No filtering
    All,
}

impl std::fmt::Display for EntityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityClass::Listed => "listed",
            EntityClass::Unlisted => "unlisted",
            EntityClass::All => "all",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EntityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "listed" => Ok(EntityClass::Listed),
            "unlisted" => Ok(EntityClass::Unlisted),
            "all" => Ok(EntityClass::All),
            _ => Err(format!(
                "Invalid entity class: {s}. Valid options: listed, unlisted, all"
            )),
        }
    }
}

/// Pure filter over a loaded directory. No I/O.
pub fn filter_entities(entities: &[Entity], class: EntityClass) -> Vec<Entity> {
    entities
        .iter()
        .filter(|e| match class {
            EntityClass::Listed => e.is_listed(),
            EntityClass::Unlisted => !e.is_listed(),
            EntityClass::All => true,
        })
        .cloned()
        .collect()
}

/// On-disk cache payload; freshness is judged by the embedded timestamp,
/// not by file mtime.
#[derive(Debug, Serialize, Deserialize)]
struct CachedDirectory {
    fetched_at: i64,
    entities: Vec<Entity>,
}

/// Cached, filterable company directory.
pub struct EntityCatalog {
    source: Box<dyn EntitySource>,
    cache_path: PathBuf,
    ttl: Duration,
}

impl EntityCatalog {
    /// Create a catalog over `source`, caching results at `cache_path` for
    /// `ttl` before a fresh load is required.
    pub fn new<P: Into<PathBuf>>(source: Box<dyn EntitySource>, cache_path: P, ttl: Duration) -> Self {
        Self {
            source,
            cache_path: cache_path.into(),
            ttl,
        }
    }

    /// Load the directory, reusing a cache younger than the TTL.
    ///
    /// An error here is a startup error: the caller must abort the job
    /// before any quota is spent on record fetches. Empty-with-success
    /// is reported as [`CatalogError::Empty`].
    pub async fn load(&self, credential: &str) -> Result<Vec<Entity>, CatalogError> {
        if let Some(entities) = self.load_cache() {
            info!(count = entities.len(), "using cached entity directory");
            return Ok(entities);
        }

        info!("fetching entity directory");
        let entities = self.source.load(credential).await?;
        if entities.is_empty() {
            return Err(CatalogError::Empty);
        }
        self.store_cache(&entities);
        info!(count = entities.len(), "entity directory loaded");
        Ok(entities)
    }

    fn load_cache(&self) -> Option<Vec<Entity>> {
        if !self.cache_path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(&self.cache_path) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to read directory cache; refetching");
                return None;
            }
        };
        let cached: CachedDirectory = match serde_json::from_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "directory cache is corrupt; refetching");
                return None;
            }
        };
        let age_ms = chrono::Utc::now().timestamp_millis() - cached.fetched_at;
        if age_ms < 0 || age_ms as u128 >= self.ttl.as_millis() {
            debug!(age_ms, "directory cache expired");
            return None;
        }
        if cached.entities.is_empty() {
            return None;
        }
        Some(cached.entities)
    }

    /// Cache writes are best-effort; a failure degrades to refetching later.
    fn store_cache(&self, entities: &[Entity]) {
        let cached = CachedDirectory {
            fetched_at: chrono::Utc::now().timestamp_millis(),
            entities: entities.to_vec(),
        };
        if let Err(e) = write_cache(&self.cache_path, &cached) {
            warn!(error = %e, path = %self.cache_path.display(), "failed to write directory cache");
        }
    }
}

fn write_cache(path: &Path, cached: &CachedDirectory) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CatalogError::Io(e.to_string()))?;
    }
    let json = serde_json::to_string(cached).map_err(|e| CatalogError::Io(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| CatalogError::Io(e.to_string()))
}
