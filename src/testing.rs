//! In-memory stand-ins for the remote services, with call counters.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::SummaryStore;
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::domain::commit::CommitRecord;
use crate::domain::issue::Issue;
use crate::domain::pull_request::PullRequestRecord;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::services::{CodeHostService, LanguageModelService, Release};

#[derive(Default)]
pub struct FakeCodeHost {
    pub pull_requests: HashMap<u64, PullRequestRecord>,
    pub reviews: HashMap<u64, BTreeSet<String>>,
    pub patches: HashMap<u64, String>,
    pub commit_messages: HashMap<String, Vec<String>>,
    pub closed_issues: HashMap<u64, Vec<Issue>>,
    pub release: Option<Release>,
    pub generated_body: Option<AppResult<String>>,
    pub deny_release: bool,
    pub deny_update: bool,
    pub compare: Vec<CommitRecord>,
    pub diffs: HashMap<String, String>,
    /// Pull request numbers whose fetch fails.
    pub failing: BTreeSet<u64>,
    pub latency: Option<Duration>,
    pub pull_request_calls: Mutex<HashMap<u64, usize>>,
    pub reviewer_calls: Mutex<HashMap<u64, usize>>,
    pub updates: Mutex<Vec<(u64, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeCodeHost {
    pub fn with_pull_request(mut self, record: PullRequestRecord) -> Self {
        self.pull_requests.insert(record.number, record);
        self
    }

    pub fn with_reviews(mut self, number: u64, logins: &[&str]) -> Self {
        self.reviews
            .insert(number, logins.iter().map(|login| login.to_string()).collect());
        self
    }

    pub fn pull_request_calls(&self, number: u64) -> usize {
        count(&self.pull_request_calls, number)
    }

    pub fn reviewer_calls(&self, number: u64) -> usize {
        count(&self.reviewer_calls, number)
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn count(calls: &Mutex<HashMap<u64, usize>>, number: u64) -> usize {
    calls.lock().unwrap().get(&number).copied().unwrap_or(0)
}

fn record_call(calls: &Mutex<HashMap<u64, usize>>, number: u64) {
    *calls.lock().unwrap().entry(number).or_default() += 1;
}

#[async_trait]
impl CodeHostService for FakeCodeHost {
    async fn get_pull_request(
        &self,
        _repository: &Repository,
        number: u64,
    ) -> AppResult<PullRequestRecord> {
        let _guard = self.enter().await;
        record_call(&self.pull_request_calls, number);
        if self.failing.contains(&number) {
            return Err(AppError::CodeHost(format!("pull request #{number} unavailable")));
        }
        self.pull_requests
            .get(&number)
            .cloned()
            .ok_or_else(|| AppError::CodeHost(format!("pull request #{number} not found")))
    }

    async fn get_reviewers(
        &self,
        _repository: &Repository,
        number: u64,
    ) -> AppResult<BTreeSet<String>> {
        let _guard = self.enter().await;
        record_call(&self.reviewer_calls, number);
        Ok(self.reviews.get(&number).cloned().unwrap_or_default())
    }

    async fn get_patch(&self, _repository: &Repository, number: u64) -> AppResult<Option<String>> {
        Ok(self.patches.get(&number).cloned())
    }

    async fn get_commit_messages(&self, commits_url: &str) -> AppResult<Vec<String>> {
        Ok(self
            .commit_messages
            .get(commits_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_closed_issues(
        &self,
        _repository: &Repository,
        number: u64,
    ) -> AppResult<Vec<Issue>> {
        Ok(self.closed_issues.get(&number).cloned().unwrap_or_default())
    }

    async fn get_release(&self, _repository: &Repository, tag: &str) -> AppResult<Release> {
        if self.deny_release {
            return Err(AppError::PermissionDenied(format!("release {tag}")));
        }
        self.release
            .clone()
            .ok_or_else(|| AppError::CodeHost(format!("no release for {tag}")))
    }

    async fn generate_release_notes(
        &self,
        _repository: &Repository,
        _tag: &str,
    ) -> AppResult<String> {
        match &self.generated_body {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(AppError::PermissionDenied(message))) => {
                Err(AppError::PermissionDenied(message.clone()))
            }
            Some(Err(err)) => Err(AppError::CodeHost(err.to_string())),
            None => Err(AppError::CodeHost("no generated notes".to_string())),
        }
    }

    async fn update_release(&self, _repository: &Repository, id: u64, body: &str) -> AppResult<()> {
        if self.deny_update {
            return Err(AppError::PermissionDenied("update release".to_string()));
        }
        self.updates.lock().unwrap().push((id, body.to_string()));
        Ok(())
    }

    async fn compare_commits(
        &self,
        _repository: &Repository,
        _base: &str,
        _head: &str,
    ) -> AppResult<Vec<CommitRecord>> {
        Ok(self.compare.clone())
    }

    async fn tag_commits(&self, _repository: &Repository, _tag: &str) -> AppResult<Vec<CommitRecord>> {
        Ok(self.compare.clone())
    }

    async fn get_commit_diff(&self, _repository: &Repository, sha: &str) -> AppResult<String> {
        Ok(self.diffs.get(sha).cloned().unwrap_or_default())
    }
}

/// Answers every prompt with a canned reply and remembers the prompts.
pub struct FakeLanguageModel {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLanguageModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModelService for FakeLanguageModel {
    fn model_name(&self) -> String {
        "fake-model".to_string()
    }

    async fn summarize(&self, prompt: &str) -> AppResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.reply.trim().is_empty() {
            return Err(AppError::LanguageModel("empty completion".to_string()));
        }
        Ok(self.reply.clone())
    }
}

pub fn pr_record(number: u64, title: &str, author: &str) -> PullRequestRecord {
    PullRequestRecord {
        number,
        title: title.to_string(),
        body: String::new(),
        html_url: format!("https://github.com/acme/app/pull/{number}"),
        commits_url: None,
        author: author.to_string(),
        merged_by: None,
        labels: BTreeSet::new(),
    }
}

pub fn context(
    host: Arc<FakeCodeHost>,
    model: Arc<FakeLanguageModel>,
    summaries: Option<Arc<dyn SummaryStore>>,
) -> Arc<AppContext> {
    Arc::new(AppContext::new(
        AppConfig::default(),
        host,
        model,
        summaries,
        "PROMPT".to_string(),
    ))
}
