use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::change::Change;

static PULL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s/]+/[^\s/]+/[^\s/]+/pull/(\d+)").expect("valid pull url regex")
});

const NEW_CONTRIBUTOR_MARKER: &str = "made their first contribution";

/// One row of a release body.
#[derive(Debug)]
pub struct ReleaseLine {
    pub original_text: String,
    pub change_number: Option<u64>,
    pub is_new_contributor: bool,
    pub summary: Option<String>,
    pub change: Option<Change>,
}

impl ReleaseLine {
    pub fn parse(text: &str) -> Self {
        let change_number = PULL_URL
            .captures(text)
            .and_then(|caps| caps[1].parse().ok());

        Self {
            original_text: text.to_string(),
            change_number,
            is_new_contributor: text.contains(NEW_CONTRIBUTOR_MARKER),
            summary: None,
            change: None,
        }
    }

    /// A line whose change is already known, as in the commit-based flow.
    pub fn with_change(original_text: String, change: Change) -> Self {
        Self {
            original_text,
            change_number: change.number(),
            is_new_contributor: false,
            summary: None,
            change: Some(change),
        }
    }

    /// Whether the orchestrator should resolve and summarise this line.
    pub fn is_eligible(&self) -> bool {
        !self.is_new_contributor && (self.change_number.is_some() || self.change.is_some())
    }
}

impl fmt::Display for ReleaseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.summary, &self.change) {
            (Some(summary), Some(change)) => write!(f, "* {summary} ({})", change.html_url()),
            _ => f.write_str(&self.original_text),
        }
    }
}

/// Split a release body into lines, one per input line, blank lines included.
pub fn parse_body(body: &str) -> Vec<ReleaseLine> {
    body.split('\n')
        .map(|line| ReleaseLine::parse(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}
