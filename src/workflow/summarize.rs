use std::sync::Arc;

use tracing::debug;

use crate::cache::SummaryStore;
use crate::context::AppContext;
use crate::domain::change::Change;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::services::CodeHostService;
use crate::workflow::resolve::{closed_issues, commit_diff, patch_or_commit_messages};

/// Prompt for summarising `change`: the template, the first closed issue if
/// any, the change description, and its patch or commit messages.
pub async fn build_prompt(
    host: &dyn CodeHostService,
    change: &Change,
    template: &str,
    max_patch_size: usize,
) -> AppResult<String> {
    let mut prompt = template.to_string();
    match change {
        Change::PullRequest(pr) => {
            let (issues, changes) = futures::try_join!(
                closed_issues(host, pr),
                patch_or_commit_messages(host, pr, max_patch_size),
            )?;
            if let Some(issue) = issues.first() {
                prompt.push_str(&format!("\n\n\n{issue}"));
            }
            prompt.push_str(&format!(
                "\n\n\n{pr}\n\nPR Patch or commit messages: {changes}"
            ));
        }
        Change::Commit(commit) => {
            let diff = commit_diff(host, commit, max_patch_size).await?;
            prompt.push_str(&format!("\n\n\n{commit}\n\nDiff: {diff}"));
        }
    }
    Ok(prompt)
}

/// One-line summary for `change`, from the cache when possible.
///
/// Fresh summaries are written back under the change's canonical key, so a
/// pull request and its backports share one entry.
pub async fn summarize(
    ctx: &AppContext,
    repository: &Repository,
    change: &Change,
) -> AppResult<String> {
    let key = change.summary_key();

    if let Some(store) = &ctx.summaries {
        if let Some(cached) = cache_get(store, repository, &key).await? {
            debug!(%repository, key, "summary cache hit");
            return Ok(cached);
        }
    }

    let prompt = build_prompt(
        ctx.code_host.as_ref(),
        change,
        &ctx.prompt_template,
        ctx.config.llm.max_patch_size,
    )
    .await?;
    let reply = ctx.language_model.summarize(&prompt).await?;
    let summary = clean_summary(&reply);
    if summary.is_empty() {
        return Err(AppError::LanguageModel(format!(
            "empty summary for change {key}"
        )));
    }

    if let Some(store) = &ctx.summaries {
        cache_put(store, repository, &key, &summary).await?;
    }
    Ok(summary)
}

fn clean_summary(reply: &str) -> String {
    reply.trim_start_matches([' ', '-']).trim_end().to_string()
}

async fn cache_get(
    store: &Arc<dyn SummaryStore>,
    repository: &Repository,
    key: &str,
) -> AppResult<Option<String>> {
    let store = Arc::clone(store);
    let repository = repository.clone();
    let key = key.to_string();
    blocking(move || store.get(&repository, &key)).await
}

async fn cache_put(
    store: &Arc<dyn SummaryStore>,
    repository: &Repository,
    key: &str,
    summary: &str,
) -> AppResult<()> {
    let store = Arc::clone(store);
    let repository = repository.clone();
    let key = key.to_string();
    let summary = summary.to_string();
    blocking(move || store.put(&repository, &key, &summary)).await
}

async fn blocking<T, F>(work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::Task(err.to_string()))?
}
