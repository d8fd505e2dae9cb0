use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::{debug, info};

use crate::cache::{open_store, store_path};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::infra::github::GitHubClient;
use crate::infra::openai::OpenAiClient;
use crate::workflow::release;

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Repository name, or `owner/name`.
    pub repo: String,
    /// Release tag to rewrite.
    pub tag: String,
    /// Repository owner; defaults to `github.owner` from the config.
    #[arg(long)]
    pub owner: Option<String>,
    /// Neither read nor write the summary cache.
    #[arg(long)]
    pub no_cache: bool,
    /// Prompt template file to use instead of the built-in one.
    #[arg(long)]
    pub prompt_path: Option<PathBuf>,
    /// Build the notes from the commits since the previous tag.
    #[arg(long)]
    pub force_use_commits: bool,
    /// Group entries under a heading per conventional type.
    #[arg(long)]
    pub group_by_type: bool,
    #[arg(long = "exclude-type", value_name = "TYPE")]
    pub exclude_types: Vec<String>,
    #[arg(long = "exclude-label", value_name = "LABEL")]
    pub exclude_labels: Vec<String>,
    #[arg(long = "exclude-author", value_name = "LOGIN")]
    pub exclude_authors: Vec<String>,
    /// Maximum number of lines resolved at the same time.
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Publish the result as the release's new body.
    #[arg(long)]
    pub update: bool,
}

impl GenerateArgs {
    /// Fold the flags into `config`; flags win over file and environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(path) = &self.prompt_path {
            config.prompt_path = Some(path.clone());
        }
        if self.force_use_commits {
            config.force_use_commits = true;
        }
        if self.group_by_type {
            config.grouping.group_by_type = true;
        }
        config.filters.exclude_types.extend(self.exclude_types.iter().cloned());
        config.filters.exclude_labels.extend(self.exclude_labels.iter().cloned());
        config.filters.exclude_authors.extend(self.exclude_authors.iter().cloned());
        if let Some(limit) = self.concurrency {
            config.concurrency.0 = limit;
        }
    }

    pub fn repository(&self, config: &AppConfig) -> AppResult<Repository> {
        if let Some((owner, name)) = self.repo.split_once('/') {
            return Ok(Repository::new(owner, name));
        }
        let owner = self
            .owner
            .as_deref()
            .or(config.github.owner.as_deref())
            .ok_or_else(|| {
                AppError::Configuration(
                    "no repository owner; pass --owner or set github.owner".to_string(),
                )
            })?;
        Ok(Repository::new(owner, self.repo.as_str()))
    }
}

pub async fn run(mut config: AppConfig, args: GenerateArgs) -> AppResult<()> {
    args.apply(&mut config);
    let repository = Arc::new(args.repository(&config)?);

    let summaries = if config.cache.enabled {
        let path = store_path(config.cache.backend, &config.cache.name)?;
        debug!(path = %path.display(), backend = config.cache.backend.as_str(), "opening summary cache");
        Some(open_store(config.cache.backend, &path)?)
    } else {
        None
    };
    let prompt_template = config.prompt_template()?;

    let code_host = Arc::new(GitHubClient::new(
        config.github.api_url.clone(),
        config.github.token.clone(),
    ));
    let language_model = Arc::new(OpenAiClient::new(
        config.llm.api_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.max_retries,
    ));
    let ctx = Arc::new(AppContext::new(
        config,
        code_host,
        language_model,
        summaries,
        prompt_template,
    ));

    let notes = release::generate(&ctx, &repository, &args.tag).await?;
    println!("{notes}");

    if args.update {
        if release::publish(&ctx, &repository, &args.tag, &notes).await? {
            info!(tag = %args.tag, "release body replaced");
        } else {
            eprintln!("Warning: release {} was not updated.", args.tag);
        }
    }
    Ok(())
}
