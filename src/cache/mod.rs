//! Durable store of generated summaries, keyed by repository and canonical
//! change key.
//!
//! Both backends treat the most recent `put` for a key as authoritative.

mod jsonl;
mod sqlite;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::config_directory;
use crate::domain::repository::Repository;
use crate::error::AppResult;

pub use jsonl::JsonlStore;
pub use sqlite::SqliteStore;

/// Safe to share between fetch workers; implementations synchronise internally.
pub trait SummaryStore: Send + Sync {
    fn get(&self, repository: &Repository, key: &str) -> AppResult<Option<String>>;
    fn put(&self, repository: &Repository, key: &str, summary: &str) -> AppResult<()>;
    fn delete(&self, repository: &Repository, key: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Jsonl,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Sqlite => "sqlite",
            CacheBackend::Jsonl => "jsonl",
        }
    }
}

/// Location of the cache file. Relative names live in the config directory.
pub fn store_path(backend: CacheBackend, name: &str) -> AppResult<PathBuf> {
    let name = Path::new(name);
    let base = if name.is_absolute() {
        name.to_path_buf()
    } else {
        config_directory()?.join(name)
    };
    Ok(base.with_extension(backend.as_str()))
}

pub fn open_store(backend: CacheBackend, path: &Path) -> AppResult<Arc<dyn SummaryStore>> {
    Ok(match backend {
        CacheBackend::Sqlite => Arc::new(SqliteStore::open(path)?),
        CacheBackend::Jsonl => Arc::new(JsonlStore::new(path)),
    })
}
