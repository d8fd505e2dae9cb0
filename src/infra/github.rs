use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::{
    Client, IntoUrl, RequestBuilder, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, USER_AGENT},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::commit::CommitRecord;
use crate::domain::issue::Issue;
use crate::domain::pull_request::PullRequestRecord;
use crate::domain::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::services::{CodeHostService, Release};

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const PATCH_MEDIA_TYPE: &str = "application/vnd.github.patch";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";
const API_VERSION: &str = "2022-11-28";

const CLOSING_ISSUES_QUERY: &str = "query($owner: String!, $name: String!, $number: Int!, $first: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      closingIssuesReferences(first: $first) {
        edges { node { title body } }
      }
    }
  }
}";

pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: String, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn token(&self) -> AppResult<&str> {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Configuration("GitHub token not configured".to_string()))
    }

    fn authorized(&self, request: RequestBuilder, accept: &str) -> AppResult<RequestBuilder> {
        Ok(request
            .header(AUTHORIZATION, format!("Bearer {}", self.token()?))
            .header(ACCEPT, accept)
            .header(USER_AGENT, concat!("relnotes/", env!("CARGO_PKG_VERSION")))
            .header("X-GitHub-Api-Version", API_VERSION))
    }

    fn repo_url(&self, repository: &Repository, path: &str) -> String {
        format!("{}{path}", repository.api_path(&self.api_url))
    }

    /// Repository endpoint with each of `segments` percent-encoded, for
    /// paths that carry tag names.
    fn repo_endpoint(&self, repository: &Repository, segments: &[&str]) -> AppResult<Url> {
        let base = repository.api_path(&self.api_url);
        let mut url = Url::parse(&base).map_err(|err| {
            AppError::Configuration(format!("invalid GitHub API URL {base}: {err}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration(format!("GitHub API URL {base} cannot have a path")))?
            .extend(segments);
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> AppResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| AppError::CodeHost(format!("failed to call GitHub: {err}")))?;
        Self::check(response).await
    }

    async fn check(response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response>".to_string());
        let message = format!("GitHub responded with {status}: {body}");
        if status == StatusCode::FORBIDDEN {
            return Err(AppError::PermissionDenied(message));
        }
        Err(AppError::CodeHost(message))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: impl IntoUrl + Send) -> AppResult<T> {
        let request = self.authorized(self.http.get(url), JSON_MEDIA_TYPE)?;
        Self::fetch_json(request).await
    }

    async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> AppResult<T> {
        Self::send(request).await?.json().await.map_err(|err| {
            AppError::CodeHost(format!("failed to parse GitHub response: {err}"))
        })
    }

    async fn get_text(&self, url: &str, accept: &str) -> AppResult<String> {
        let request = self.authorized(self.http.get(url), accept)?;
        Self::send(request)
            .await?
            .text()
            .await
            .map_err(|err| AppError::CodeHost(format!("failed to read GitHub response: {err}")))
    }
}

#[async_trait]
impl CodeHostService for GitHubClient {
    async fn get_pull_request(
        &self,
        repository: &Repository,
        number: u64,
    ) -> AppResult<PullRequestRecord> {
        let payload: PullRequestPayload = self
            .get_json(&self.repo_url(repository, &format!("/pulls/{number}")))
            .await?;
        Ok(payload.into())
    }

    async fn get_reviewers(
        &self,
        repository: &Repository,
        number: u64,
    ) -> AppResult<BTreeSet<String>> {
        let reviews: Vec<ReviewPayload> = self
            .get_json(&self.repo_url(repository, &format!("/pulls/{number}/reviews")))
            .await?;
        Ok(reviews
            .into_iter()
            .filter_map(|review| review.user.map(|user| user.login))
            .collect())
    }

    async fn get_patch(&self, repository: &Repository, number: u64) -> AppResult<Option<String>> {
        let url = self.repo_url(repository, &format!("/pulls/{number}"));
        let request = self.authorized(self.http.get(&url), PATCH_MEDIA_TYPE)?;
        let response = request
            .send()
            .await
            .map_err(|err| AppError::CodeHost(format!("failed to call GitHub: {err}")))?;
        // GitHub answers 406 when the diff exceeds its own size limit.
        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }
        Self::check(response)
            .await?
            .text()
            .await
            .map(Some)
            .map_err(|err| AppError::CodeHost(format!("failed to read patch: {err}")))
    }

    async fn get_commit_messages(&self, commits_url: &str) -> AppResult<Vec<String>> {
        let commits: Vec<CommitPayload> = self.get_json(commits_url).await?;
        Ok(commits.into_iter().map(|commit| commit.commit.message).collect())
    }

    async fn get_closed_issues(
        &self,
        repository: &Repository,
        number: u64,
    ) -> AppResult<Vec<Issue>> {
        let body = json!({
            "query": CLOSING_ISSUES_QUERY,
            "variables": {
                "owner": repository.owner,
                "name": repository.name,
                "number": number,
                "first": 1,
            },
        });
        let request = self.authorized(
            self.http.post(format!("{}/graphql", self.api_url)).json(&body),
            JSON_MEDIA_TYPE,
        )?;
        let payload: GraphQlResponse = Self::fetch_json(request).await?;
        if !payload.errors.is_empty() {
            let messages = payload
                .errors
                .iter()
                .map(|error| error.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AppError::CodeHost(format!(
                "GitHub GraphQL query for #{number} failed: {messages}"
            )));
        }

        let edges = payload
            .data
            .and_then(|data| data.repository)
            .and_then(|repository| repository.pull_request)
            .map(|pr| pr.closing_issues_references.edges)
            .unwrap_or_default();
        Ok(edges
            .into_iter()
            .map(|edge| Issue {
                title: edge.node.title,
                body: edge.node.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn get_release(&self, repository: &Repository, tag: &str) -> AppResult<Release> {
        let payload: ReleasePayload = self
            .get_json(self.repo_endpoint(repository, &["releases", "tags", tag])?)
            .await?;
        Ok(Release {
            id: payload.id,
            body: payload.body.unwrap_or_default(),
        })
    }

    async fn generate_release_notes(
        &self,
        repository: &Repository,
        tag: &str,
    ) -> AppResult<String> {
        let request = self.authorized(
            self.http
                .post(self.repo_url(repository, "/releases/generate-notes"))
                .json(&GenerateNotesRequest { tag_name: tag }),
            JSON_MEDIA_TYPE,
        )?;
        let payload: GeneratedNotesPayload =
            Self::send(request).await?.json().await.map_err(|err| {
                AppError::CodeHost(format!("failed to parse generated notes: {err}"))
            })?;
        Ok(payload.body)
    }

    async fn update_release(&self, repository: &Repository, id: u64, body: &str) -> AppResult<()> {
        let request = self.authorized(
            self.http
                .patch(self.repo_url(repository, &format!("/releases/{id}")))
                .json(&UpdateReleaseRequest { body }),
            JSON_MEDIA_TYPE,
        )?;
        Self::send(request).await?;
        Ok(())
    }

    async fn compare_commits(
        &self,
        repository: &Repository,
        base: &str,
        head: &str,
    ) -> AppResult<Vec<CommitRecord>> {
        let range = format!("{base}...{head}");
        let payload: ComparePayload = self
            .get_json(self.repo_endpoint(repository, &["compare", &range])?)
            .await?;
        Ok(payload.commits.into_iter().map(Into::into).collect())
    }

    async fn tag_commits(&self, repository: &Repository, tag: &str) -> AppResult<Vec<CommitRecord>> {
        let request = self.authorized(
            self.http
                .get(self.repo_url(repository, "/commits"))
                .query(&[("sha", tag), ("per_page", "100")]),
            JSON_MEDIA_TYPE,
        )?;
        let mut commits: Vec<CommitPayload> = Self::fetch_json(request).await?;
        commits.sort_by(|a, b| a.committed_at().cmp(b.committed_at()));
        Ok(commits.into_iter().map(Into::into).collect())
    }

    async fn get_commit_diff(&self, repository: &Repository, sha: &str) -> AppResult<String> {
        self.get_text(&self.repo_url(repository, &format!("/commits/{sha}")), DIFF_MEDIA_TYPE)
            .await
    }
}

#[derive(Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Deserialize)]
struct LabelPayload {
    name: String,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    title: String,
    body: Option<String>,
    html_url: String,
    commits_url: Option<String>,
    user: Option<UserPayload>,
    merged_by: Option<UserPayload>,
    #[serde(default)]
    labels: Vec<LabelPayload>,
}

impl From<PullRequestPayload> for PullRequestRecord {
    fn from(payload: PullRequestPayload) -> Self {
        Self {
            number: payload.number,
            title: payload.title,
            body: payload.body.unwrap_or_default(),
            html_url: payload.html_url,
            commits_url: payload.commits_url,
            author: payload.user.map(|user| user.login).unwrap_or_default(),
            merged_by: payload.merged_by.map(|user| user.login),
            labels: payload.labels.into_iter().map(|label| label.name).collect(),
        }
    }
}

#[derive(Deserialize)]
struct ReviewPayload {
    user: Option<UserPayload>,
}

#[derive(Deserialize)]
struct CommitPayload {
    sha: String,
    html_url: String,
    author: Option<UserPayload>,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<SignaturePayload>,
    committer: Option<SignaturePayload>,
}

#[derive(Deserialize)]
struct SignaturePayload {
    name: Option<String>,
    date: Option<String>,
}

impl CommitPayload {
    fn committed_at(&self) -> &str {
        self.commit
            .committer
            .as_ref()
            .and_then(|committer| committer.date.as_deref())
            .unwrap_or_default()
    }
}

impl From<CommitPayload> for CommitRecord {
    fn from(payload: CommitPayload) -> Self {
        // Commits by unknown emails have no linked account; fall back to the git name.
        let author = payload
            .author
            .map(|user| user.login)
            .or_else(|| payload.commit.author.and_then(|author| author.name))
            .unwrap_or_default();
        Self {
            sha: payload.sha,
            message: payload.commit.message,
            author,
            html_url: payload.html_url,
        }
    }
}

#[derive(Deserialize)]
struct ComparePayload {
    #[serde(default)]
    commits: Vec<CommitPayload>,
}

#[derive(Deserialize)]
struct ReleasePayload {
    id: u64,
    body: Option<String>,
}

#[derive(Serialize)]
struct GenerateNotesRequest<'a> {
    tag_name: &'a str,
}

#[derive(Deserialize)]
struct GeneratedNotesPayload {
    body: String,
}

#[derive(Serialize)]
struct UpdateReleaseRequest<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct GraphQlData {
    repository: Option<GraphQlRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRepository {
    pull_request: Option<GraphQlPullRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlPullRequest {
    closing_issues_references: GraphQlConnection,
}

#[derive(Deserialize)]
struct GraphQlConnection {
    edges: Vec<GraphQlEdge>,
}

#[derive(Deserialize)]
struct GraphQlEdge {
    node: GraphQlIssue,
}

#[derive(Deserialize)]
struct GraphQlIssue {
    title: String,
    body: Option<String>,
}
