use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::SummaryStore;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};

#[derive(Serialize, Deserialize)]
struct CacheRow {
    owner: String,
    repo: String,
    key: String,
    summary: String,
}

impl CacheRow {
    fn matches(&self, repository: &Repository, key: &str) -> bool {
        self.owner == repository.owner && self.repo == repository.name && self.key == key
    }
}

/// Append-only file of JSON rows, one per line.
///
/// Writes append; reads scan the whole file and keep the last matching row;
/// deletes rewrite the file. A single lock covers every operation so a
/// delete's read-modify-write never interleaves with an append.
pub struct JsonlStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_rows(&self) -> AppResult<Vec<CacheRow>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AppError::Io(err)),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<CacheRow>(line)
                    .map_err(|err| AppError::Cache(format!("invalid cache row: {err}")))
            })
            .collect()
    }

    fn encode(row: &CacheRow) -> AppResult<String> {
        serde_json::to_string(row)
            .map_err(|err| AppError::Cache(format!("failed to encode cache row: {err}")))
    }
}

impl SummaryStore for JsonlStore {
    fn get(&self, repository: &Repository, key: &str) -> AppResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .read_rows()?
            .into_iter()
            .rev()
            .find(|row| row.matches(repository, key))
            .map(|row| row.summary))
    }

    fn put(&self, repository: &Repository, key: &str, summary: &str) -> AppResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = Self::encode(&CacheRow {
            owner: repository.owner.clone(),
            repo: repository.name.clone(),
            key: key.to_string(),
            summary: summary.to_string(),
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn delete(&self, repository: &Repository, key: &str) -> AppResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.path.exists() {
            return Ok(());
        }

        let mut data = String::new();
        for row in self.read_rows()? {
            if !row.matches(repository, key) {
                data.push_str(&Self::encode(&row)?);
                data.push('\n');
            }
        }

        let staging = self.path.with_extension("jsonl.tmp");
        fs::write(&staging, data)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
