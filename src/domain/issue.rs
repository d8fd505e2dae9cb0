use std::fmt;

/// An issue closed by a pull request, used as extra prompt context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub title: String,
    pub body: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Issue Title: {}\n\nIssue Body: {}", self.title, self.body)
    }
}
