//! Pull request comment publishing

use crate::config::CommentStrategy;
use crate::errors::{FlakeDiffError, Result};
use crate::report::extract_commit;
use crate::{log_op_end, log_op_error, log_op_start};
use async_trait::async_trait;
use flakediff_core_types::Sensitive;
use serde::{Deserialize, Serialize};

const PAGE_SIZE: usize = 100;
const USER_AGENT: &str = concat!("flakediff/", env!("CARGO_PKG_VERSION"));

/// An existing issue comment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
}

/// Issue-comment endpoints of the hosting API
#[async_trait]
pub trait CommentApi: Send + Sync {
    /// All comments on the pull request, oldest first
    async fn list_comments(&self, pr_number: u64) -> Result<Vec<IssueComment>>;

    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<IssueComment>;

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<IssueComment>;
}

/// REST client for issue comments
pub struct GithubCommentClient {
    http: reqwest::Client,
    api_url: String,
    repository: String,
    token: Sensitive<String>,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

fn api_error(operation: &str, err: impl std::fmt::Display) -> FlakeDiffError {
    FlakeDiffError::GitHubApi {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

impl GithubCommentClient {
    /// # Errors
    ///
    /// `InvalidConfig` when the token or repository is empty.
    pub fn new(
        api_url: impl Into<String>,
        repository: impl Into<String>,
        token: Sensitive<String>,
    ) -> Result<Self> {
        let repository = repository.into();
        if token.is_empty() {
            return Err(FlakeDiffError::invalid_config(
                "github-token",
                "a token is required to post comments",
            ));
        }
        if repository.is_empty() {
            return Err(FlakeDiffError::invalid_config(
                "GITHUB_REPOSITORY",
                "repository is not set",
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| api_error("client", e))?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repository,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_url, self.repository, path)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| api_error(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(
                operation,
                format!("HTTP {}: {}", status, text.trim()),
            ));
        }
        response.json().await.map_err(|e| api_error(operation, e))
    }
}

#[async_trait]
impl CommentApi for GithubCommentClient {
    async fn list_comments(&self, pr_number: u64) -> Result<Vec<IssueComment>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let url = self.url(&format!(
                "/issues/{}/comments?per_page={}&page={}",
                pr_number, PAGE_SIZE, page
            ));
            let batch: Vec<IssueComment> = self
                .send("list_comments", self.request(reqwest::Method::GET, url))
                .await?;
            let done = batch.len() < PAGE_SIZE;
            all.extend(batch);
            if done {
                return Ok(all);
            }
            page += 1;
        }
    }

    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<IssueComment> {
        let url = self.url(&format!("/issues/{}/comments", pr_number));
        self.send(
            "create_comment",
            self.request(reqwest::Method::POST, url)
                .json(&CommentBody { body }),
        )
        .await
    }

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<IssueComment> {
        let url = self.url(&format!("/issues/comments/{}", comment_id));
        self.send(
            "update_comment",
            self.request(reqwest::Method::PATCH, url)
                .json(&CommentBody { body }),
        )
        .await
    }
}

/// What [`publish_report`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created(u64),
    Updated(u64),
    /// The existing comment already reports the same commit
    Unchanged(u64),
}

impl PublishOutcome {
    pub fn comment_id(&self) -> u64 {
        match self {
            PublishOutcome::Created(id)
            | PublishOutcome::Updated(id)
            | PublishOutcome::Unchanged(id) => *id,
        }
    }
}

/// Post `body` on the pull request according to `strategy`
///
/// With [`CommentStrategy::Update`] the most recent comment containing
/// `marker` is edited in place, unless it already reports the commit that
/// `body` reports.
///
/// # Errors
///
/// `GitHubApi` from any failed request.
pub async fn publish_report(
    api: &dyn CommentApi,
    pr_number: u64,
    body: &str,
    strategy: CommentStrategy,
    marker: &str,
) -> Result<PublishOutcome> {
    log_op_start!("comment_publish", pr_number, strategy = ?strategy);
    let start = std::time::Instant::now();

    let result = publish_report_impl(api, pr_number, body, strategy, marker).await;

    match &result {
        Ok(outcome) => {
            log_op_end!(
                "comment_publish",
                duration_ms = start.elapsed().as_millis() as u64,
                outcome = ?outcome
            );
        }
        Err(e) => {
            log_op_error!(
                "comment_publish",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
        }
    }
    result
}

async fn publish_report_impl(
    api: &dyn CommentApi,
    pr_number: u64,
    body: &str,
    strategy: CommentStrategy,
    marker: &str,
) -> Result<PublishOutcome> {
    if strategy == CommentStrategy::Update {
        let comments = api.list_comments(pr_number).await?;
        if let Some(existing) = comments.iter().rev().find(|c| c.body.contains(marker)) {
            let new_commit = extract_commit(body);
            if new_commit.is_some() && extract_commit(&existing.body) == new_commit {
                return Ok(PublishOutcome::Unchanged(existing.id));
            }
            let updated = api.update_comment(existing.id, body).await?;
            return Ok(PublishOutcome::Updated(updated.id));
        }
    }

    let created = api.create_comment(pr_number, body).await?;
    Ok(PublishOutcome::Created(created.id))
}
