//! Bounded fan-out over the eligible lines of a release.
//!
//! Each eligible line becomes one task: resolve the change, attribute its
//! reviewers and summarise it. At most `concurrency` tasks run at once.
//! After the first failure, tasks that have not started yet are skipped;
//! tasks already running finish. Every task is joined before returning, and
//! the first error observed is returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::context::AppContext;
use crate::domain::change::Change;
use crate::domain::notes::ReleaseNotes;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::workflow::attribution::{get_author, set_reviewers};
use crate::workflow::resolve::{resolve_backport_chain, resolve_pull_request};
use crate::workflow::summarize::summarize;

struct LineWork {
    index: usize,
    change_number: Option<u64>,
    change: Option<Change>,
}

struct LineOutcome {
    index: usize,
    change: Change,
    summary: Option<String>,
}

#[instrument(skip_all, fields(repository = %repository, concurrency = concurrency))]
pub async fn resolve_all(
    ctx: &Arc<AppContext>,
    notes: &mut ReleaseNotes,
    repository: &Arc<Repository>,
    concurrency: usize,
) -> AppResult<()> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let failed = Arc::new(AtomicBool::new(false));
    let mut tasks = JoinSet::new();

    for (index, line) in notes.lines.iter_mut().enumerate() {
        if !line.is_eligible() {
            continue;
        }
        let work = LineWork {
            index,
            change_number: line.change_number,
            change: line.change.take(),
        };
        let ctx = Arc::clone(ctx);
        let repository = Arc::clone(repository);
        let permits = Arc::clone(&permits);
        let failed = Arc::clone(&failed);

        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|err| AppError::Task(err.to_string()))?;
            if failed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            let outcome = process_line(&ctx, &repository, work).await;
            if outcome.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
            outcome.map(Some)
        });
    }

    info!(tasks = tasks.len(), "resolving changes");
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap_or_else(|err| Err(AppError::Task(err.to_string())));
        match result {
            Ok(Some(outcome)) => {
                let line = &mut notes.lines[outcome.index];
                line.change = Some(outcome.change);
                line.summary = outcome.summary;
            }
            Ok(None) => {}
            Err(err) => {
                if first_error.is_none() {
                    warn!(error = %err, "line failed, skipping pending work");
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn process_line(
    ctx: &AppContext,
    repository: &Arc<Repository>,
    work: LineWork,
) -> AppResult<LineOutcome> {
    let host = ctx.code_host.as_ref();
    let change = match (work.change, work.change_number) {
        (Some(change), _) => change,
        (None, Some(number)) => {
            let pr = resolve_pull_request(host, repository, number).await?;
            resolve_backport_chain(host, &pr, Vec::new()).await?;
            if pr.is_revert() {
                debug!(pr = pr.number, reverts = ?pr.reverted_number(), "revert detected");
            }
            Change::PullRequest(pr)
        }
        (None, None) => {
            return Err(AppError::Task(format!(
                "line {} has nothing to resolve",
                work.index
            )));
        }
    };

    let filters = &ctx.config.filters;
    let summarise = !change.is_filtered(&filters.exclude_types, &filters.exclude_labels);
    let summary = async {
        if summarise {
            summarize(ctx, repository, &change).await.map(Some)
        } else {
            debug!(key = change.summary_key(), "filtered change, not summarising");
            Ok(None)
        }
    };
    let (_, summary) = futures::try_join!(
        set_reviewers(host, &change, &filters.exclude_authors),
        summary,
    )?;

    debug!(line = work.index, author = get_author(&change), "line resolved");
    Ok(LineOutcome {
        index: work.index,
        change,
        summary,
    })
}
