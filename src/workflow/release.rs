use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::domain::change::Change;
use crate::domain::commit::Commit;
use crate::domain::line::ReleaseLine;
use crate::domain::notes::{ReleaseNotes, RenderOptions};
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::workflow::orchestrate::resolve_all;

static COMPARE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/compare/(\S+?)\.\.\.(\S+)").expect("valid compare link regex")
});

const FULL_CHANGELOG: &str = "**Full Changelog**";

/// Rewrite the notes of the release tagged `tag` and return the new body.
///
/// The host is asked to regenerate the notes first; the release itself is
/// only read when that is refused.
#[instrument(skip(ctx, repository), fields(repository = %repository))]
pub async fn generate(
    ctx: &Arc<AppContext>,
    repository: &Arc<Repository>,
    tag: &str,
) -> AppResult<String> {
    let host = ctx.code_host.as_ref();
    let body = match host.generate_release_notes(repository, tag).await {
        Ok(body) => body,
        Err(err) if err.is_permission_denied() => {
            warn!(error = %err, "cannot regenerate release notes, keeping the current body");
            current_body(ctx, repository, tag).await?
        }
        Err(err) => return Err(err),
    };

    let mut notes = if ctx.config.force_use_commits {
        commit_notes(ctx, repository, tag, &body).await?
    } else {
        ReleaseNotes::parse(&body)
    };

    resolve_all(ctx, &mut notes, repository, ctx.config.concurrency.get()).await?;

    let filters = &ctx.config.filters;
    let model_name = ctx.language_model.model_name();
    let output = notes.serialize(RenderOptions {
        exclude_types: Some(&filters.exclude_types),
        exclude_labels: Some(&filters.exclude_labels),
        exclude_authors: Some(&filters.exclude_authors),
        grouping: Some(&ctx.config.grouping),
        model_name: Some(&model_name),
    });
    info!(
        lines = notes.lines.len(),
        authors = notes.authors().len(),
        reviewers = notes.reviewers().len(),
        "release notes generated"
    );
    Ok(output)
}

/// Body of the published release, or an empty body when reading it is refused.
async fn current_body(ctx: &AppContext, repository: &Repository, tag: &str) -> AppResult<String> {
    match ctx.code_host.get_release(repository, tag).await {
        Ok(release) => Ok(release.body),
        Err(err) if err.is_permission_denied() => {
            warn!(error = %err, "cannot read the release either, continuing with an empty body");
            Ok(String::new())
        }
        Err(err) => Err(err),
    }
}

/// Replace the body of the release tagged `tag`. Returns `false` when the
/// host refuses, which is not an error.
#[instrument(skip(ctx, repository, body), fields(repository = %repository))]
pub async fn publish(
    ctx: &AppContext,
    repository: &Repository,
    tag: &str,
    body: &str,
) -> AppResult<bool> {
    let host = ctx.code_host.as_ref();
    let outcome = async {
        let release = host.get_release(repository, tag).await?;
        host.update_release(repository, release.id, body).await
    }
    .await;

    match outcome {
        Ok(()) => {
            info!(tag, "release updated");
            Ok(true)
        }
        Err(err) if err.is_permission_denied() => {
            warn!(error = %err, "not allowed to update the release, skipping");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Tag the generated notes compare against, if any.
pub fn previous_tag(body: &str) -> Option<String> {
    body.lines()
        .filter(|line| line.contains(FULL_CHANGELOG))
        .find_map(|line| COMPARE_LINK.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Notes built from the commits since the previous tag, one line per commit
/// with its change already attached.
async fn commit_notes(
    ctx: &AppContext,
    repository: &Arc<Repository>,
    tag: &str,
    body: &str,
) -> AppResult<ReleaseNotes> {
    let host = ctx.code_host.as_ref();
    let records = match previous_tag(body) {
        Some(previous) => {
            info!(%previous, tag, "listing commits between tags");
            host.compare_commits(repository, &previous, tag).await?
        }
        None => {
            info!(tag, "no previous tag, listing commits of the tag");
            host.tag_commits(repository, tag).await?
        }
    };
    if records.is_empty() {
        return Err(AppError::CodeHost(format!("no commits found for {tag}")));
    }

    let mut lines = vec![ReleaseLine::parse("## What's Changed")];
    for record in records {
        let commit = Commit::from_record(Arc::clone(repository), record);
        let text = format!(
            "* {} by @{} in {}",
            commit.headline(),
            commit.author,
            commit.html_url
        );
        lines.push(ReleaseLine::with_change(text, Change::Commit(commit)));
    }
    if let Some(changelog) = body.lines().find(|line| line.contains(FULL_CHANGELOG)) {
        lines.push(ReleaseLine::parse(""));
        lines.push(ReleaseLine::parse(changelog));
    }
    Ok(ReleaseNotes { lines })
}
