//! Thin GitHub REST client scoped to the endpoints the bridge needs, with
//! bounded retries for rate limits and transient transport failures.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use otto_review::{
    GithubIssueComment, GithubIssueDetail, GithubPullRequestDetail, GithubPullRequestFile,
    GithubPullRequestSummary, GithubReviewComment,
};

use super::RepoRef;

const PAGE_SIZE: usize = 100;
const ERROR_BODY_LIMIT: usize = 800;
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize)]
pub(super) struct CreatedComment {
    pub(super) id: u64,
}

#[derive(Clone)]
pub(super) struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub(super) fn new(
        api_base: String,
        token: String,
        repo: RepoRef,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("otto-review-bridge"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub(super) async fn list_open_pull_requests(&self) -> Result<Vec<GithubPullRequestSummary>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let api_base = self.api_base.clone();
            let owner = self.repo.owner.clone();
            let repo = self.repo.name.clone();
            let page_value = page.to_string();
            let chunk: Vec<GithubPullRequestSummary> = self
                .request_json("list open pull requests", || {
                    self.http
                        .get(format!("{}/repos/{owner}/{repo}/pulls", api_base))
                        .query(&[
                            ("state", "open"),
                            ("per_page", "100"),
                            ("page", page_value.as_str()),
                        ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub(super) async fn get_pull_request(&self, number: u64) -> Result<GithubPullRequestDetail> {
        self.request_json("get pull request", || {
            self.http.get(format!(
                "{}/repos/{}/{}/pulls/{}",
                self.api_base, self.repo.owner, self.repo.name, number
            ))
        })
        .await
    }

    pub(super) async fn list_pull_request_files(
        &self,
        number: u64,
    ) -> Result<Vec<GithubPullRequestFile>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let api_base = self.api_base.clone();
            let owner = self.repo.owner.clone();
            let repo = self.repo.name.clone();
            let page_value = page.to_string();
            let chunk: Vec<GithubPullRequestFile> = self
                .request_json("list pull request files", || {
                    self.http
                        .get(format!(
                            "{}/repos/{}/{}/pulls/{}/files",
                            api_base, owner, repo, number
                        ))
                        .query(&[("per_page", "100"), ("page", page_value.as_str())])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub(super) async fn list_issue_comments(
        &self,
        number: u64,
    ) -> Result<Vec<GithubIssueComment>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let api_base = self.api_base.clone();
            let owner = self.repo.owner.clone();
            let repo = self.repo.name.clone();
            let page_value = page.to_string();
            let chunk: Vec<GithubIssueComment> = self
                .request_json("list issue comments", || {
                    self.http
                        .get(format!(
                            "{}/repos/{}/{}/issues/{}/comments",
                            api_base, owner, repo, number
                        ))
                        .query(&[
                            ("sort", "created"),
                            ("direction", "asc"),
                            ("per_page", "100"),
                            ("page", page_value.as_str()),
                        ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub(super) async fn list_review_comments(
        &self,
        number: u64,
    ) -> Result<Vec<GithubReviewComment>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let api_base = self.api_base.clone();
            let owner = self.repo.owner.clone();
            let repo = self.repo.name.clone();
            let page_value = page.to_string();
            let chunk: Vec<GithubReviewComment> = self
                .request_json("list review comments", || {
                    self.http
                        .get(format!(
                            "{}/repos/{}/{}/pulls/{}/comments",
                            api_base, owner, repo, number
                        ))
                        .query(&[
                            ("sort", "created"),
                            ("direction", "asc"),
                            ("per_page", "100"),
                            ("page", page_value.as_str()),
                        ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub(super) async fn get_issue(&self, number: u64) -> Result<GithubIssueDetail> {
        self.request_json("get issue", || {
            self.http.get(format!(
                "{}/repos/{}/{}/issues/{}",
                self.api_base, self.repo.owner, self.repo.name, number
            ))
        })
        .await
    }

    pub(super) async fn create_issue_comment(
        &self,
        number: u64,
        body: &str,
    ) -> Result<CreatedComment> {
        let payload = json!({ "body": body });
        self.request_json("create issue comment", || {
            self.http
                .post(format!(
                    "{}/repos/{}/{}/issues/{}/comments",
                    self.api_base, self.repo.owner, self.repo.name, number
                ))
                .json(&payload)
        })
        .await
    }

    /// Posts an inline reply into an existing review-comment thread.
    pub(super) async fn create_review_comment_reply(
        &self,
        pull_number: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<CreatedComment> {
        let payload = json!({ "body": body });
        self.request_json("create review comment reply", || {
            self.http
                .post(format!(
                    "{}/repos/{}/{}/pulls/{}/comments/{}/replies",
                    self.api_base, self.repo.owner, self.repo.name, pull_number, comment_id
                ))
                .json(&payload)
        })
        .await
    }

    pub(super) async fn add_issue_comment_reaction(
        &self,
        comment_id: u64,
        content: &str,
    ) -> Result<()> {
        let payload = json!({ "content": content });
        let _: serde_json::Value = self
            .request_json("add issue comment reaction", || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/issues/comments/{}/reactions",
                        self.api_base, self.repo.owner, self.repo.name, comment_id
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    pub(super) async fn add_review_comment_reaction(
        &self,
        comment_id: u64,
        content: &str,
    ) -> Result<()> {
        let payload = json!({ "content": content });
        let _: serde_json::Value = self
            .request_json("add review comment reaction", || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/pulls/comments/{}/reactions",
                        self.api_base, self.repo.owner, self.repo.name, comment_id
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-otto-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode github {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, ERROR_BODY_LIMIT)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(MAX_BACKOFF_MS))
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn is_retryable_github_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
