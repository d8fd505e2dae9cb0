use std::sync::LazyLock;

use regex::Regex;

// 2-8 letters keeps "a: b" and "verylongword: b" out.
static CONVENTIONAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z]{2,8})(?:\([^)]*\))?:\s+\S").expect("valid conventional regex")
});

/// Leading conventional-commit type of a title or message, lowercased.
pub fn conventional_type(text: &str) -> Option<String> {
    CONVENTIONAL_PREFIX
        .captures(text)
        .map(|caps| caps[1].to_ascii_lowercase())
}
