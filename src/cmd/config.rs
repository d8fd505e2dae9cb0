use std::path::Path;

use clap::{Args, Subcommand};

use crate::config::{AppConfig, config_file_path};
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked).
    Show,
}

pub fn run(command: ConfigCommand, path: Option<&Path>) -> AppResult<()> {
    match command {
        ConfigCommand::Show => run_show(path),
    }
}

fn run_show(path: Option<&Path>) -> AppResult<()> {
    let config = AppConfig::load(path)?;
    let file = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    println!("Configuration file: {}", file.display());
    for (label, value) in describe(&config) {
        println!("{label}: {value}");
    }
    Ok(())
}

fn describe(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("GitHub token", mask_secret(&config.github.token)),
        ("GitHub owner", display_value(&config.github.owner)),
        ("GitHub API URL", config.github.api_url.clone()),
        ("OpenAI API key", mask_secret(&config.llm.api_key)),
        ("OpenAI model", config.llm.model.clone()),
        ("OpenAI API URL", config.llm.api_url.clone()),
        ("Max patch size", config.llm.max_patch_size.to_string()),
        ("Max attempts", config.llm.max_retries.to_string()),
        ("Cache backend", config.cache.backend.as_str().to_string()),
        ("Cache name", config.cache.name.clone()),
        ("Cache enabled", config.cache.enabled.to_string()),
        ("Excluded types", join(&config.filters.exclude_types)),
        ("Excluded labels", join(&config.filters.exclude_labels)),
        ("Excluded authors", join(&config.filters.exclude_authors)),
        ("Group by type", config.grouping.group_by_type.to_string()),
        (
            "Prompt file",
            display_value(
                &config
                    .prompt_path
                    .as_ref()
                    .map(|path| path.display().to_string()),
            ),
        ),
        ("Concurrency", config.concurrency.get().to_string()),
        ("Force commits", config.force_use_commits.to_string()),
    ]
}

fn join<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let joined = values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "<none>".to_string()
    } else {
        joined
    }
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(token) if token.chars().count() > 6 => {
            let chars = token.chars().collect::<Vec<_>>();
            let prefix = chars[..3].iter().collect::<String>();
            let suffix = chars[chars.len() - 3..].iter().collect::<String>();
            format!("{prefix}***{suffix}")
        }
        Some(token) if !token.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}
