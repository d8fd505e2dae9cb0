use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use super::SummaryStore;
use crate::domain::repository::Repository;
use crate::error::AppResult;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS summaries (
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    change_key TEXT NOT NULL,
    summary TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_summaries_owner_repo_key
    ON summaries (owner, repo, change_key);
";

/// SQLite table of summaries behind one connection.
///
/// Every statement runs under the connection mutex, so readers and writers
/// from different workers never share the handle concurrently.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> AppResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SummaryStore for SqliteStore {
    fn get(&self, repository: &Repository, key: &str) -> AppResult<Option<String>> {
        let conn = self.connection();
        let summary = conn
            .query_row(
                "SELECT summary FROM summaries
                 WHERE owner = ?1 AND repo = ?2 AND change_key = ?3
                 ORDER BY rowid DESC LIMIT 1",
                params![repository.owner, repository.name, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(summary)
    }

    fn put(&self, repository: &Repository, key: &str, summary: &str) -> AppResult<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM summaries WHERE owner = ?1 AND repo = ?2 AND change_key = ?3",
            params![repository.owner, repository.name, key],
        )?;
        tx.execute(
            "INSERT INTO summaries (owner, repo, change_key, summary) VALUES (?1, ?2, ?3, ?4)",
            params![repository.owner, repository.name, key, summary],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, repository: &Repository, key: &str) -> AppResult<()> {
        self.connection().execute(
            "DELETE FROM summaries WHERE owner = ?1 AND repo = ?2 AND change_key = ?3",
            params![repository.owner, repository.name, key],
        )?;
        Ok(())
    }
}
