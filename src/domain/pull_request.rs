use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::OnceCell;

use crate::domain::conventional::conventional_type;
use crate::domain::repository::Repository;

static BACKPORT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(backport #(\d+)\)\s*$").expect("valid backport regex"));

// Checked in order; the first match wins.
static REVERT_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i:reverts)\s+[\w.-]+/[\w.-]+#(\d+)").expect("valid revert regex"),
        Regex::new(r"(?i:reverts)\s+https?://\S+?/pull/(\d+)").expect("valid revert regex"),
        Regex::new(r"(?i:reverts)\s+#(\d+)").expect("valid revert regex"),
    ]
});

/// Pull request fields as delivered by the code host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub html_url: String,
    pub commits_url: Option<String>,
    pub author: String,
    pub merged_by: Option<String>,
    pub labels: BTreeSet<String>,
}

/// A resolved pull request.
///
/// `backport_of` and `reviewers` start empty and are filled at most once by
/// the resolver and the attribution pass respectively.
#[derive(Debug)]
pub struct PullRequest {
    pub repository: Arc<Repository>,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub html_url: String,
    pub commits_url: Option<String>,
    pub author: String,
    pub merged_by: Option<String>,
    pub labels: BTreeSet<String>,
    pub(crate) backport_of: OnceCell<Option<Box<PullRequest>>>,
    pub(crate) reviewers: OnceCell<BTreeSet<String>>,
}

impl PullRequest {
    pub fn from_record(repository: Arc<Repository>, record: PullRequestRecord) -> Self {
        Self {
            repository,
            number: record.number,
            title: record.title,
            body: record.body,
            html_url: record.html_url,
            commits_url: record.commits_url,
            author: record.author,
            merged_by: record.merged_by,
            labels: record.labels,
            backport_of: OnceCell::new(),
            reviewers: OnceCell::new(),
        }
    }

    /// Number of the original pull request when the title ends in `(backport #N)`.
    pub fn backport_no(&self) -> Option<u64> {
        BACKPORT_SUFFIX
            .captures(&self.title)
            .and_then(|caps| caps[1].parse().ok())
    }

    pub fn reverted_number(&self) -> Option<u64> {
        REVERT_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(&self.body))
            .and_then(|caps| caps[1].parse().ok())
    }

    pub fn is_revert(&self) -> bool {
        self.reverted_number().is_some()
    }

    pub fn conventional_type(&self) -> Option<String> {
        conventional_type(&self.title)
    }

    /// The origin pull request, if it has been resolved already.
    pub fn resolved_backport_of(&self) -> Option<&PullRequest> {
        self.backport_of.get().and_then(|origin| origin.as_deref())
    }

    pub fn reviewers(&self) -> Option<&BTreeSet<String>> {
        self.reviewers.get()
    }

    /// Author credited for this change: the author at the end of the resolved
    /// backport chain.
    pub fn effective_author(&self) -> &str {
        let mut current = self;
        while let Some(origin) = current.resolved_backport_of() {
            current = origin;
        }
        &current.author
    }

    /// Cache key shared by a pull request and all of its backports. Usable
    /// before the backport chain is resolved.
    pub fn summary_key(&self) -> String {
        self.backport_no().unwrap_or(self.number).to_string()
    }
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PR Title: {}\n\nPR Body: {}", self.title, self.body)
    }
}
