use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::domain::conventional::conventional_type;
use crate::domain::repository::Repository;

/// Commit fields as delivered by the code host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub html_url: String,
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub repository: Arc<Repository>,
    pub sha: String,
    pub message: String,
    pub author: String,
    pub html_url: String,
    pub labels: BTreeSet<String>,
}

impl Commit {
    pub fn from_record(repository: Arc<Repository>, record: CommitRecord) -> Self {
        Self {
            repository,
            sha: record.sha,
            message: record.message,
            author: record.author,
            html_url: record.html_url,
            labels: BTreeSet::new(),
        }
    }

    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }

    pub fn conventional_type(&self) -> Option<String> {
        conventional_type(&self.message)
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commit Message: {}", self.message)
    }
}
