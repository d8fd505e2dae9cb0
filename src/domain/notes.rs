use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::line::{ReleaseLine, parse_body};

/// Built-in section order and headings for grouped output.
const DEFAULT_HEADINGS: [(&str, &str); 11] = [
    ("feat", "Features"),
    ("fix", "Bug Fixes"),
    ("perf", "Performance Improvements"),
    ("docs", "Documentation"),
    ("refactor", "Code Refactoring"),
    ("test", "Tests"),
    ("build", "Build System"),
    ("ci", "CI/CD"),
    ("chore", "Chores"),
    ("style", "Style"),
    ("revert", "Reverts"),
];

const GENERATED_HEADER: &str = "## What's Changed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grouping {
    pub group_by_type: bool,
    /// Extra or overridden headings, keyed by conventional type.
    pub type_headings: BTreeMap<String, String>,
    pub other_heading: String,
}

impl Default for Grouping {
    fn default() -> Self {
        Self {
            group_by_type: false,
            type_headings: BTreeMap::new(),
            other_heading: "Other Changes".to_string(),
        }
    }
}

impl Grouping {
    pub fn heading_for(&self, kind: &str) -> Option<&str> {
        self.type_headings.get(kind).map(String::as_str).or_else(|| {
            DEFAULT_HEADINGS
                .iter()
                .find(|(known, _)| *known == kind)
                .map(|(_, heading)| *heading)
        })
    }

    /// Known types first, then configured extras, in emission order.
    fn section_order(&self) -> Vec<&str> {
        let mut order = DEFAULT_HEADINGS
            .iter()
            .map(|(kind, _)| *kind)
            .collect::<Vec<_>>();
        for kind in self.type_headings.keys() {
            if !order.contains(&kind.as_str()) {
                order.push(kind);
            }
        }
        order
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub exclude_types: Option<&'a BTreeSet<String>>,
    pub exclude_labels: Option<&'a BTreeSet<String>>,
    pub exclude_authors: Option<&'a BTreeSet<String>>,
    pub grouping: Option<&'a Grouping>,
    pub model_name: Option<&'a str>,
}

/// A parsed release body, one entry per line.
#[derive(Debug, Default)]
pub struct ReleaseNotes {
    pub lines: Vec<ReleaseLine>,
}

impl ReleaseNotes {
    pub fn parse(body: &str) -> Self {
        Self {
            lines: parse_body(body),
        }
    }

    /// Effective authors in order of first appearance.
    pub fn authors(&self) -> Vec<&str> {
        collect_authors(self.lines.iter())
    }

    pub fn reviewers(&self) -> Vec<&str> {
        collect_reviewers(self.lines.iter())
    }

    /// Pull request numbers to drop because both the change and its revert
    /// appear in this document.
    pub fn revert_pairs(&self) -> BTreeSet<u64> {
        let numbers = self
            .lines
            .iter()
            .filter_map(|line| line.change.as_ref()?.number())
            .collect::<BTreeSet<_>>();

        let mut suppressed = BTreeSet::new();
        for change in self.lines.iter().filter_map(|line| line.change.as_ref()) {
            let (Some(number), Some(target)) = (change.number(), change.reverted_number()) else {
                continue;
            };
            if numbers.contains(&target) {
                suppressed.insert(number);
                suppressed.insert(target);
            }
        }
        suppressed
    }

    pub fn serialize(&self, options: RenderOptions<'_>) -> String {
        let empty = BTreeSet::new();
        let exclude_types = options.exclude_types.unwrap_or(&empty);
        let exclude_labels = options.exclude_labels.unwrap_or(&empty);
        let exclude_authors = options.exclude_authors.unwrap_or(&empty);
        let suppressed = self.revert_pairs();

        let visible = self
            .lines
            .iter()
            .filter(|line| match &line.change {
                None => true,
                Some(change) => {
                    let reverted = change.number().is_some_and(|n| suppressed.contains(&n));
                    !reverted && !change.is_filtered(exclude_types, exclude_labels)
                }
            })
            .collect::<Vec<_>>();

        let mut output = match options.grouping.filter(|grouping| grouping.group_by_type) {
            Some(grouping) => render_grouped(&visible, grouping),
            None => visible
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        };

        // Credit covers every resolved change, including filtered and reverted ones.
        let authors = self
            .authors()
            .into_iter()
            .filter(|author| !exclude_authors.contains(*author))
            .collect::<Vec<_>>();
        let reviewers = self
            .reviewers()
            .into_iter()
            .filter(|reviewer| !exclude_authors.contains(*reviewer))
            .collect::<Vec<_>>();

        if !authors.is_empty() {
            output.push_str(&format!("\n**Authors**: {}", mention_list(&authors)));
        }
        if !reviewers.is_empty() {
            output.push_str(&format!("\n**Reviewers**: {}", mention_list(&reviewers)));
        }
        if let Some(model) = options.model_name {
            output.push_str(&disclaimer(model));
        }

        output
    }
}

fn render_grouped(visible: &[&ReleaseLine], grouping: &Grouping) -> String {
    let mut sections: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    let mut other = Vec::new();
    let mut passthrough = Vec::new();

    for line in visible {
        let Some(change) = &line.change else {
            if line.original_text.trim() != GENERATED_HEADER {
                passthrough.push(line.original_text.as_str());
            }
            continue;
        };
        let kind = change.conventional_type();
        match kind.as_deref().and_then(|kind| grouping.heading_for(kind)) {
            Some(heading) => sections.entry(heading).or_default().push(line.to_string()),
            None => other.push(line.to_string()),
        }
    }

    let mut blocks = Vec::new();
    for kind in grouping.section_order() {
        let Some(heading) = grouping.heading_for(kind) else {
            continue;
        };
        if let Some(entries) = sections.remove(heading) {
            blocks.push(format!("## {heading}\n{}", entries.join("\n")));
        }
    }
    if !other.is_empty() {
        blocks.push(format!("## {}\n{}", grouping.other_heading, other.join("\n")));
    }

    let trailer = passthrough
        .iter()
        .skip_while(|text| text.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if !trailer.trim().is_empty() {
        blocks.push(trailer.trim_end().to_string());
    }

    blocks.join("\n\n")
}

fn collect_authors<'a>(lines: impl Iterator<Item = &'a ReleaseLine>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    lines
        .filter_map(|line| line.change.as_ref())
        .map(|change| change.author())
        .filter(|author| !author.is_empty() && seen.insert(*author))
        .collect()
}

fn collect_reviewers<'a>(lines: impl Iterator<Item = &'a ReleaseLine>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    lines
        .filter_map(|line| line.change.as_ref()?.reviewers())
        .flat_map(|reviewers| reviewers.iter().map(String::as_str))
        .filter(|reviewer| seen.insert(*reviewer))
        .collect()
}

fn mention_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("@{name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn disclaimer(model: &str) -> String {
    format!(
        "\n\n<details>\n<summary>AI content</summary>\n\n\
These release notes were written with help from an LLM ({model}), which reviewed\n\
and summarised the code changes together with the linked issue and pull request\n\
descriptions. They may contain the usual errors and inaccuracies.\n\n\
</details>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change::Change;
    use crate::domain::pull_request::PullRequest;
    use crate::domain::pull_request::tests::pull_request;

    fn line(pr: PullRequest, summary: &str) -> ReleaseLine {
        let mut line = ReleaseLine::with_change(String::new(), Change::PullRequest(pr));
        line.summary = Some(summary.to_string());
        line
    }

    fn with_author(mut pr: PullRequest, author: &str) -> PullRequest {
        pr.author = author.to_string();
        pr
    }

    #[test]
    fn drops_change_and_revert_in_same_release() {
        let notes = ReleaseNotes {
            lines: vec![
                line(pull_request(100, "feat: add new feature", "Implements X"), "Added new feature X"),
                line(pull_request(102, "fix: unrelated bug fix", "Fixes Y"), "Fixed issue Y"),
                line(
                    pull_request(105, "Revert \"feat: add new feature\"", "Reverts frappe/frappe#100\n\nBroke prod"),
                    "Reverted feature X",
                ),
            ],
        };

        let output = notes.serialize(RenderOptions::default());
        assert!(!output.contains("Added new feature X"));
        assert!(!output.contains("Reverted feature X"));
        assert!(output.contains("Fixed issue Y"));
    }

    #[test]
    fn keeps_revert_when_original_is_absent() {
        let notes = ReleaseNotes {
            lines: vec![line(
                pull_request(200, "Revert \"feat: old feature\"", "Reverts frappe/frappe#50"),
                "Reverted old feature",
            )],
        };
        assert!(notes.serialize(RenderOptions::default()).contains("Reverted old feature"));
    }

    #[test]
    fn drops_revert_even_when_original_is_type_filtered() {
        let notes = ReleaseNotes {
            lines: vec![
                line(pull_request(100, "chore: update dependencies", ""), "Updated dependencies"),
                line(pull_request(102, "fix: unrelated", ""), "Fixed issue Y"),
                line(
                    pull_request(105, "Revert \"chore: update dependencies\"", "Reverts frappe/frappe#100"),
                    "Reverted dependency update",
                ),
            ],
        };
        let types = BTreeSet::from(["chore".to_string()]);
        let output = notes.serialize(RenderOptions {
            exclude_types: Some(&types),
            ..RenderOptions::default()
        });
        assert!(!output.contains("Updated dependencies"));
        assert!(!output.contains("Reverted dependency update"));
        assert!(output.contains("Fixed issue Y"));
    }

    #[test]
    fn groups_by_type_in_fixed_order() {
        let notes = ReleaseNotes {
            lines: vec![
                line(pull_request(4, "Update dependencies", ""), "Updated dependencies"),
                line(pull_request(3, "fix: resolve login bug", ""), "Fixed login bug"),
                line(pull_request(1, "feat: add new dashboard", ""), "Added new dashboard"),
                line(pull_request(2, "feat(ui): improve navigation", ""), "Improved navigation"),
            ],
        };
        let grouping = Grouping {
            group_by_type: true,
            ..Grouping::default()
        };
        let output = notes.serialize(RenderOptions {
            grouping: Some(&grouping),
            ..RenderOptions::default()
        });
        let rows = output.lines().collect::<Vec<_>>();

        let features = rows.iter().position(|row| *row == "## Features").unwrap();
        let fixes = rows.iter().position(|row| *row == "## Bug Fixes").unwrap();
        let other = rows.iter().position(|row| *row == "## Other Changes").unwrap();
        assert!(features < fixes && fixes < other);

        let section = |from: usize, to: usize| rows[from..to].join("\n");
        assert!(section(features, fixes).contains("Added new dashboard"));
        assert!(section(features, fixes).contains("Improved navigation"));
        assert!(section(fixes, other).contains("Fixed login bug"));
        assert!(!section(fixes, other).contains("Updated dependencies"));
        assert!(section(other, rows.len()).contains("Updated dependencies"));
    }

    #[test]
    fn grouping_respects_filters() {
        let notes = ReleaseNotes {
            lines: vec![
                line(pull_request(1, "feat: add feature", ""), "Added feature"),
                line(pull_request(2, "chore: update deps", ""), "Updated deps"),
            ],
        };
        let grouping = Grouping {
            group_by_type: true,
            ..Grouping::default()
        };
        let types = BTreeSet::from(["chore".to_string()]);
        let output = notes.serialize(RenderOptions {
            exclude_types: Some(&types),
            grouping: Some(&grouping),
            ..RenderOptions::default()
        });
        assert!(output.contains("## Features"));
        assert!(!output.contains("Updated deps"));
        assert!(!output.contains("## Chores"));
    }

    #[test]
    fn custom_headings_follow_builtin_sections() {
        let notes = ReleaseNotes {
            lines: vec![
                line(pull_request(1, "sec: patch xss", ""), "Patched XSS"),
                line(pull_request(2, "fix: typo", ""), "Fixed typo"),
            ],
        };
        let grouping = Grouping {
            group_by_type: true,
            type_headings: BTreeMap::from([("sec".to_string(), "Security".to_string())]),
            ..Grouping::default()
        };
        let output = notes.serialize(RenderOptions {
            grouping: Some(&grouping),
            ..RenderOptions::default()
        });
        let fixes = output.find("## Bug Fixes").unwrap();
        let security = output.find("## Security").unwrap();
        assert!(fixes < security);
        assert!(!output.contains("## Other Changes"));
    }

    #[test]
    fn flat_output_has_no_sections() {
        let notes = ReleaseNotes {
            lines: vec![
                line(pull_request(1, "feat: add feature", ""), "Added feature"),
                line(pull_request(2, "fix: fix bug", ""), "Fixed bug"),
            ],
        };
        let output = notes.serialize(RenderOptions::default());
        assert!(!output.contains("## Features"));
        assert!(output.contains("* Added feature (https://github.com/frappe/frappe/pull/1)"));
        assert!(output.contains("* Fixed bug"));
    }

    #[test]
    fn footer_lists_authors_and_reviewers_without_excluded() {
        let first = with_author(pull_request(1, "feat: a", ""), "alice");
        first
            .reviewers
            .set(BTreeSet::from(["carol".to_string(), "dependabot".to_string()]))
            .unwrap();
        let second = with_author(pull_request(2, "fix: b", ""), "dependabot");
        second.reviewers.set(BTreeSet::new()).unwrap();

        let notes = ReleaseNotes {
            lines: vec![line(first, "A"), line(second, "B")],
        };
        let bots = BTreeSet::from(["dependabot".to_string()]);
        let output = notes.serialize(RenderOptions {
            exclude_authors: Some(&bots),
            ..RenderOptions::default()
        });

        assert!(output.contains("\n**Authors**: @alice\n"));
        assert!(output.ends_with("**Reviewers**: @carol"));
    }

    #[test]
    fn footer_credits_filtered_changes() {
        let feature = with_author(pull_request(1, "feat: dashboards", ""), "alice");
        feature.reviewers.set(BTreeSet::new()).unwrap();
        let chore = with_author(pull_request(2, "chore: bump deps", ""), "carol");
        chore.reviewers.set(BTreeSet::from(["dave".to_string()])).unwrap();

        let notes = ReleaseNotes {
            lines: vec![line(feature, "Added dashboards"), line(chore, "Bumped deps")],
        };
        let types = BTreeSet::from(["chore".to_string()]);
        let output = notes.serialize(RenderOptions {
            exclude_types: Some(&types),
            ..RenderOptions::default()
        });

        assert!(!output.contains("Bumped deps"));
        assert!(output.contains("**Authors**: @alice, @carol"));
        assert!(output.ends_with("**Reviewers**: @dave"));
    }

    #[test]
    fn omits_reviewer_footer_when_empty() {
        let notes = ReleaseNotes {
            lines: vec![line(with_author(pull_request(1, "feat: a", ""), "alice"), "A")],
        };
        let output = notes.serialize(RenderOptions::default());
        assert!(output.ends_with("**Authors**: @alice"));
        assert!(!output.contains("**Reviewers**"));
    }

    #[test]
    fn appends_model_disclaimer() {
        let notes = ReleaseNotes::parse("## What's Changed");
        let output = notes.serialize(RenderOptions {
            model_name: Some("OpenAI gpt-4.1"),
            ..RenderOptions::default()
        });
        assert!(output.starts_with("## What's Changed"));
        assert!(output.contains("<summary>AI content</summary>"));
        assert!(output.contains("(OpenAI gpt-4.1)"));
    }

    #[test]
    fn unresolved_body_round_trips() {
        let body = "## What's Changed\n\n**Full Changelog**: https://github.com/a/b/compare/v1...v2";
        let notes = ReleaseNotes::parse(body);
        assert_eq!(notes.serialize(RenderOptions::default()), body);
    }

    #[test]
    fn grouped_output_keeps_trailing_sections() {
        let mut notes = ReleaseNotes::parse(
            "## What's Changed\n\n## New Contributors\n* @bob made their first contribution in https://github.com/a/b/pull/9",
        );
        notes.lines.insert(1, line(pull_request(1, "feat: a", ""), "Added A"));
        let grouping = Grouping {
            group_by_type: true,
            ..Grouping::default()
        };
        let output = notes.serialize(RenderOptions {
            grouping: Some(&grouping),
            ..RenderOptions::default()
        });
        assert!(output.starts_with("## Features\n* Added A"));
        assert!(output.contains("\n\n## New Contributors\n* @bob made their first contribution"));
        assert!(!output.contains("What's Changed"));
    }
}
