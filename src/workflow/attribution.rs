//! Who gets credited for a change.
//!
//! Rules for a pull request:
//! - submitted reviews plus the merger count as reviewers;
//! - the author never reviews their own work;
//! - a backport inherits the reviewers of its origin, minus the origin's author;
//! - excluded accounts (bots) are dropped last.

use std::collections::BTreeSet;

use futures::future::BoxFuture;

use crate::domain::change::Change;
use crate::domain::pull_request::PullRequest;
use crate::error::AppResult;
use crate::services::CodeHostService;
use crate::workflow::resolve::backport_of_within;

/// Compute and store the reviewer set of `change`. The second call returns
/// the stored set without touching the code host. A failed computation
/// stores nothing.
pub async fn set_reviewers(
    host: &dyn CodeHostService,
    change: &Change,
    excluded: &BTreeSet<String>,
) -> AppResult<BTreeSet<String>> {
    match change {
        Change::PullRequest(pr) => Ok(pull_request_reviewers(host, pr, excluded, Vec::new())
            .await?
            .clone()),
        Change::Commit(_) => Ok(BTreeSet::new()),
    }
}

/// Author credited for `change`; for backports, the origin's author.
pub fn get_author(change: &Change) -> &str {
    change.author()
}

fn pull_request_reviewers<'a>(
    host: &'a dyn CodeHostService,
    pr: &'a PullRequest,
    excluded: &'a BTreeSet<String>,
    mut lineage: Vec<u64>,
) -> BoxFuture<'a, AppResult<&'a BTreeSet<String>>> {
    Box::pin(async move {
        lineage.push(pr.number);
        let lineage = &lineage;
        pr.reviewers
            .get_or_try_init(|| async move {
                let (mut reviewers, origin) = futures::try_join!(
                    host.get_reviewers(&pr.repository, pr.number),
                    backport_of_within(host, pr, lineage),
                )?;

                if let Some(merger) = &pr.merged_by {
                    reviewers.insert(merger.clone());
                }
                reviewers.remove(&pr.author);

                if let Some(origin) = origin {
                    let vetted = pull_request_reviewers(host, origin, excluded, lineage.clone()).await?;
                    reviewers.extend(vetted.iter().cloned());
                    reviewers.remove(&origin.author);
                }

                reviewers.retain(|login| !excluded.contains(login));
                Ok(reviewers)
            })
            .await
    })
}
