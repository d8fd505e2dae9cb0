use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::commit::CommitRecord;
use crate::domain::issue::Issue;
use crate::domain::pull_request::PullRequestRecord;
use crate::domain::repository::Repository;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: u64,
    pub body: String,
}

/// Remote operations needed from a GitHub-like code host.
///
/// Implementations report HTTP 403 as `AppError::PermissionDenied` so callers
/// can tell a recoverable refusal apart from other failures.
#[async_trait]
pub trait CodeHostService: Send + Sync {
    async fn get_pull_request(
        &self,
        repository: &Repository,
        number: u64,
    ) -> AppResult<PullRequestRecord>;

    /// Logins of everyone who submitted a review.
    async fn get_reviewers(&self, repository: &Repository, number: u64)
    -> AppResult<BTreeSet<String>>;

    /// Unified patch, or `None` when the host refuses because it is too large.
    async fn get_patch(&self, repository: &Repository, number: u64) -> AppResult<Option<String>>;

    async fn get_commit_messages(&self, commits_url: &str) -> AppResult<Vec<String>>;

    async fn get_closed_issues(&self, repository: &Repository, number: u64)
    -> AppResult<Vec<Issue>>;

    async fn get_release(&self, repository: &Repository, tag: &str) -> AppResult<Release>;

    /// Ask the host to regenerate the "What's Changed" body for a tag.
    async fn generate_release_notes(&self, repository: &Repository, tag: &str)
    -> AppResult<String>;

    async fn update_release(&self, repository: &Repository, id: u64, body: &str) -> AppResult<()>;

    /// Commits reachable from `head` but not from `base`, oldest first.
    async fn compare_commits(
        &self,
        repository: &Repository,
        base: &str,
        head: &str,
    ) -> AppResult<Vec<CommitRecord>>;

    /// Most recent commits leading up to `tag`, oldest first.
    async fn tag_commits(&self, repository: &Repository, tag: &str) -> AppResult<Vec<CommitRecord>>;

    async fn get_commit_diff(&self, repository: &Repository, sha: &str) -> AppResult<String>;
}
