use std::collections::BTreeSet;

use crate::domain::commit::Commit;
use crate::domain::pull_request::PullRequest;

/// A change being summarised: either a merged pull request or a raw commit.
///
/// Callers go through the accessors below rather than matching on the variant.
#[derive(Debug)]
pub enum Change {
    PullRequest(PullRequest),
    Commit(Commit),
}

impl Change {
    /// Pull request number; commits have none.
    pub fn number(&self) -> Option<u64> {
        match self {
            Change::PullRequest(pr) => Some(pr.number),
            Change::Commit(_) => None,
        }
    }

    pub fn html_url(&self) -> &str {
        match self {
            Change::PullRequest(pr) => &pr.html_url,
            Change::Commit(commit) => &commit.html_url,
        }
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        match self {
            Change::PullRequest(pr) => &pr.labels,
            Change::Commit(commit) => &commit.labels,
        }
    }

    pub fn conventional_type(&self) -> Option<String> {
        match self {
            Change::PullRequest(pr) => pr.conventional_type(),
            Change::Commit(commit) => commit.conventional_type(),
        }
    }

    pub fn reverted_number(&self) -> Option<u64> {
        match self {
            Change::PullRequest(pr) => pr.reverted_number(),
            Change::Commit(_) => None,
        }
    }

    /// Author credited in the footer.
    pub fn author(&self) -> &str {
        match self {
            Change::PullRequest(pr) => pr.effective_author(),
            Change::Commit(commit) => &commit.author,
        }
    }

    /// Reviewer set, once attribution has run. Commits are never reviewed.
    pub fn reviewers(&self) -> Option<&BTreeSet<String>> {
        match self {
            Change::PullRequest(pr) => pr.reviewers(),
            Change::Commit(_) => None,
        }
    }

    pub fn summary_key(&self) -> String {
        match self {
            Change::PullRequest(pr) => pr.summary_key(),
            Change::Commit(commit) => commit.sha.clone(),
        }
    }

    /// Whether the type or label filters drop this change from the output.
    pub fn is_filtered(
        &self,
        exclude_types: &BTreeSet<String>,
        exclude_labels: &BTreeSet<String>,
    ) -> bool {
        let excluded_type = self
            .conventional_type()
            .is_some_and(|kind| exclude_types.contains(&kind));
        let excluded_label = !self.labels().is_disjoint(exclude_labels);
        excluded_type || excluded_label
    }
}
