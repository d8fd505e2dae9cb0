//! Turns pull request numbers into `PullRequest` values and walks backport
//! chains on demand.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::domain::commit::Commit;
use crate::domain::issue::Issue;
use crate::domain::pull_request::PullRequest;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::services::CodeHostService;

const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED]";

pub async fn resolve_pull_request(
    host: &dyn CodeHostService,
    repository: &Arc<Repository>,
    number: u64,
) -> AppResult<PullRequest> {
    let record = host.get_pull_request(repository, number).await?;
    Ok(PullRequest::from_record(Arc::clone(repository), record))
}

/// The pull request `pr` backports, fetched on first use and memoised.
pub async fn backport_of<'a>(
    host: &dyn CodeHostService,
    pr: &'a PullRequest,
) -> AppResult<Option<&'a PullRequest>> {
    backport_of_within(host, pr, &[pr.number]).await
}

/// `lineage` holds the numbers already visited on the way to `pr`, `pr`
/// included; meeting one of them again is a cycle.
pub(crate) async fn backport_of_within<'a>(
    host: &dyn CodeHostService,
    pr: &'a PullRequest,
    lineage: &[u64],
) -> AppResult<Option<&'a PullRequest>> {
    let origin = pr
        .backport_of
        .get_or_try_init(|| async move {
            let Some(number) = pr.backport_no() else {
                return Ok(None);
            };
            if number == pr.number || lineage.contains(&number) {
                return Err(AppError::BackportCycle { number: pr.number });
            }
            debug!(pr = pr.number, origin = number, "resolving backport origin");
            let origin = resolve_pull_request(host, &pr.repository, number).await?;
            Ok(Some(Box::new(origin)))
        })
        .await?;
    Ok(origin.as_deref())
}

/// Resolve every hop of the backport chain starting at `pr`.
pub fn resolve_backport_chain<'a>(
    host: &'a dyn CodeHostService,
    pr: &'a PullRequest,
    mut lineage: Vec<u64>,
) -> BoxFuture<'a, AppResult<()>> {
    Box::pin(async move {
        lineage.push(pr.number);
        if let Some(origin) = backport_of_within(host, pr, &lineage).await? {
            resolve_backport_chain(host, origin, lineage).await?;
        }
        Ok(())
    })
}

/// Issues closed by `pr`, or by its backport origin when it closes none.
pub async fn closed_issues(host: &dyn CodeHostService, pr: &PullRequest) -> AppResult<Vec<Issue>> {
    let issues = host.get_closed_issues(&pr.repository, pr.number).await?;
    if !issues.is_empty() {
        return Ok(issues);
    }
    match backport_of(host, pr).await? {
        Some(origin) => host.get_closed_issues(&origin.repository, origin.number).await,
        None => Ok(issues),
    }
}

/// The patch when it fits in `max_patch_size` characters, else the commit
/// messages joined by newlines.
pub async fn patch_or_commit_messages(
    host: &dyn CodeHostService,
    pr: &PullRequest,
    max_patch_size: usize,
) -> AppResult<String> {
    if let Some(patch) = host.get_patch(&pr.repository, pr.number).await? {
        if !patch.is_empty() && patch.chars().count() <= max_patch_size {
            return Ok(patch);
        }
    }

    debug!(pr = pr.number, "patch unavailable or too large, using commit messages");
    let messages = match &pr.commits_url {
        Some(url) => host.get_commit_messages(url).await?,
        None => Vec::new(),
    };
    Ok(messages.join("\n"))
}

/// Commit diff, cut to `max_patch_size` characters including the marker.
pub async fn commit_diff(
    host: &dyn CodeHostService,
    commit: &Commit,
    max_patch_size: usize,
) -> AppResult<String> {
    let diff = host.get_commit_diff(&commit.repository, &commit.sha).await?;
    Ok(truncate_diff(diff, max_patch_size))
}

fn truncate_diff(diff: String, max_patch_size: usize) -> String {
    if diff.chars().count() <= max_patch_size {
        return diff;
    }
    let keep = max_patch_size.saturating_sub(TRUNCATION_MARKER.chars().count());
    let cut = diff
        .char_indices()
        .nth(keep)
        .map(|(index, _)| index)
        .unwrap_or(diff.len());
    format!("{}{TRUNCATION_MARKER}", &diff[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCodeHost, pr_record};

    fn repo() -> Arc<Repository> {
        Arc::new(Repository::new("acme", "app"))
    }

    #[tokio::test]
    async fn backport_origin_is_fetched_once() {
        let host = FakeCodeHost::default()
            .with_pull_request(pr_record(10, "feat: origin", "alice"))
            .with_pull_request(pr_record(11, "feat: origin (backport #10)", "bot"));

        let pr = resolve_pull_request(&host, &repo(), 11).await.unwrap();
        let first = backport_of(&host, &pr).await.unwrap().map(|origin| origin.number);
        let second = backport_of(&host, &pr).await.unwrap().map(|origin| origin.number);

        assert_eq!(first, Some(10));
        assert_eq!(second, Some(10));
        assert_eq!(host.pull_request_calls(10), 1);
        assert_eq!(pr.effective_author(), "alice");
    }

    #[tokio::test]
    async fn non_backport_fetches_nothing() {
        let host = FakeCodeHost::default().with_pull_request(pr_record(5, "fix: typo", "bob"));
        let pr = resolve_pull_request(&host, &repo(), 5).await.unwrap();

        assert!(backport_of(&host, &pr).await.unwrap().is_none());
        assert_eq!(host.pull_request_calls(5), 1);
    }

    #[tokio::test]
    async fn self_backport_is_an_error() {
        let host = FakeCodeHost::default().with_pull_request(pr_record(7, "fix: x (backport #7)", "bob"));
        let pr = resolve_pull_request(&host, &repo(), 7).await.unwrap();

        let err = backport_of(&host, &pr).await.unwrap_err();
        assert!(matches!(err, AppError::BackportCycle { number: 7 }));
    }

    #[tokio::test]
    async fn chain_walk_follows_every_hop_and_detects_cycles() {
        let host = FakeCodeHost::default()
            .with_pull_request(pr_record(1, "feat: root", "root-author"))
            .with_pull_request(pr_record(2, "feat: root (backport #1)", "second"))
            .with_pull_request(pr_record(3, "feat: root (backport #2)", "third"));
        let pr = resolve_pull_request(&host, &repo(), 3).await.unwrap();
        resolve_backport_chain(&host, &pr, Vec::new()).await.unwrap();
        assert_eq!(pr.effective_author(), "root-author");

        let cyclic = FakeCodeHost::default()
            .with_pull_request(pr_record(20, "fix: a (backport #21)", "x"))
            .with_pull_request(pr_record(21, "fix: a (backport #20)", "y"));
        let pr = resolve_pull_request(&cyclic, &repo(), 20).await.unwrap();
        let err = resolve_backport_chain(&cyclic, &pr, Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::BackportCycle { number: 21 }));
    }

    #[tokio::test]
    async fn fetch_failures_propagate() {
        let mut host = FakeCodeHost::default();
        host.failing.insert(4);
        let err = resolve_pull_request(&host, &repo(), 4).await.unwrap_err();
        assert!(matches!(err, AppError::CodeHost(_)));
    }

    #[tokio::test]
    async fn large_patch_falls_back_to_commit_messages() {
        let mut record = pr_record(8, "feat: big", "alice");
        record.commits_url = Some("https://api/commits/8".to_string());
        let mut host = FakeCodeHost::default().with_pull_request(record);
        host.patches.insert(8, "x".repeat(50));
        host.commit_messages.insert(
            "https://api/commits/8".to_string(),
            vec!["first".to_string(), "second".to_string()],
        );
        let pr = resolve_pull_request(&host, &repo(), 8).await.unwrap();

        assert_eq!(patch_or_commit_messages(&host, &pr, 100).await.unwrap(), "x".repeat(50));
        assert_eq!(patch_or_commit_messages(&host, &pr, 10).await.unwrap(), "first\nsecond");
    }

    #[tokio::test]
    async fn closed_issues_fall_back_to_origin() {
        let mut host = FakeCodeHost::default()
            .with_pull_request(pr_record(30, "fix: crash", "alice"))
            .with_pull_request(pr_record(31, "fix: crash (backport #30)", "bot"));
        host.closed_issues.insert(
            30,
            vec![Issue {
                title: "Crash on save".to_string(),
                body: "Steps".to_string(),
            }],
        );
        let pr = resolve_pull_request(&host, &repo(), 31).await.unwrap();

        let issues = closed_issues(&host, &pr).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, "Crash on save");
    }

    #[test]
    fn truncates_long_diffs_to_the_limit() {
        let diff = "é".repeat(40);
        let cut = truncate_diff(diff.clone(), 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with("[TRUNCATED]"));
        assert_eq!(truncate_diff(diff.clone(), 40), diff);
    }
}
