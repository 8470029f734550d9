use crate::error::{OptimizerError, Result};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_GET_ATTEMPTS: u32 = 3;
const PER_PAGE: usize = 100;

/// GitHub REST API client for workflow definitions, run history and pull requests.
///
/// Requests are issued one at a time. Idempotent GETs are retried on network errors,
/// 429 and 5xx responses with exponential backoff; writes are never retried.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    retry_delay: Duration,
}

/// Workflow run from the GitHub Actions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub workflow_id: u64,
    #[serde(default)]
    pub event: Option<String>,
}

impl WorkflowRun {
    pub fn duration_secs(&self) -> Option<f64> {
        let started = self.run_started_at?;
        let secs = (self.updated_at - started).num_seconds();
        (secs >= 0).then_some(secs as f64)
    }

    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }
}

/// Workflow registered in a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEntry {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl WorkflowEntry {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    pub full_name: String,
    pub language: Option<String>,
    pub default_branch: String,
}

/// Decoded file content plus the blob SHA needed to update it.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub sha: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowsResponse {
    workflows: Vec<WorkflowEntry>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("gha-optimizer/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| OptimizerError::Config("GitHub token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the initial backoff between GET retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Verify the token by fetching the authenticated user; returns the login.
    pub async fn authenticated_user(&self) -> Result<String> {
        let url = format!("{}/user", self.base_url);
        let user: AuthenticatedUser = self.get_json(&url, &[]).await?;
        log::info!("Connected to GitHub as: {}", user.login);
        Ok(user.login)
    }

    pub async fn repository_metadata(&self, owner: &str, repo: &str) -> Result<RepositoryMetadata> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, repo);
        self.get_json(&url, &[]).await
    }

    /// List workflows registered in the repository.
    pub async fn list_workflows(&self, owner: &str, repo: &str) -> Result<Vec<WorkflowEntry>> {
        let url = format!("{}/repos/{}/{}/actions/workflows", self.base_url, owner, repo);
        let response: WorkflowsResponse = self
            .get_json(&url, &[("per_page", PER_PAGE.to_string())])
            .await?;
        Ok(response.workflows)
    }

    /// Fetch a file through the contents API and decode it.
    pub async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent> {
        let url = format!("{}/repos/{}/{}/contents/{}", self.base_url, owner, repo, path);
        let query: Vec<(&str, String)> = git_ref
            .map(|r| vec![("ref", r.to_string())])
            .unwrap_or_default();
        let response: ContentsResponse = self.get_json(&url, &query).await?;

        if response.encoding.as_deref().is_some_and(|e| e != "base64") {
            return Err(OptimizerError::GitHub {
                status: 200,
                message: format!("unsupported content encoding for {}", path),
            });
        }

        Ok(FileContent {
            sha: response.sha,
            content: decode_content(&response.content).map_err(|message| {
                OptimizerError::GitHub {
                    status: 200,
                    message: format!("{}: {}", path, message),
                }
            })?,
        })
    }

    /// Fetch completed workflow runs created at or after `since`, newest first.
    pub async fn fetch_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>> {
        let url = format!("{}/repos/{}/{}/actions/runs", self.base_url, owner, repo);
        let created = format!(">={}", since.format("%Y-%m-%d"));

        let mut all_runs = Vec::new();
        let mut page = 1;

        while all_runs.len() < limit {
            let response: WorkflowRunsResponse = self
                .get_json(
                    &url,
                    &[
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                        ("status", "completed".to_string()),
                        ("created", created.clone()),
                    ],
                )
                .await?;

            let fetched = response.workflow_runs.len();
            all_runs.extend(response.workflow_runs);

            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        all_runs.truncate(limit);
        Ok(all_runs)
    }

    /// SHA of the commit at the head of `branch`.
    pub async fn branch_head_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/git/ref/heads/{}",
            self.base_url, owner, repo, branch
        );
        let git_ref: GitRef = self.get_json(&url, &[]).await?;
        Ok(git_ref.object.sha)
    }

    pub async fn create_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let url = format!("{}/repos/{}/{}/git/refs", self.base_url, owner, repo);
        let body = serde_json::json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        let _: serde_json::Value = self.send_json(Method::POST, &url, &body).await?;
        Ok(())
    }

    /// Commit new content for `path` on `branch`.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
        blob_sha: &str,
        content: &str,
        message: &str,
    ) -> Result<()> {
        let url = format!("{}/repos/{}/{}/contents/{}", self.base_url, owner, repo, path);
        let body = serde_json::json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "sha": blob_sha,
            "branch": branch,
        });
        let _: serde_json::Value = self.send_json(Method::PUT, &url, &body).await?;
        Ok(())
    }

    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/{}/pulls", self.base_url, owner, repo);
        let payload = serde_json::json!({
            "title": title,
            "head": head,
            "base": base,
            "body": body,
        });
        self.send_json(Method::POST, &url, &payload).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut delay = self.retry_delay;
        let mut attempt = 1;

        loop {
            let outcome = self.client.get(url).query(query).send().await;

            let retryable = match &outcome {
                Ok(resp) => is_retryable(resp.status()),
                Err(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            };

            if retryable && attempt < MAX_GET_ATTEMPTS {
                log::warn!(
                    "GitHub request to {} failed (attempt {}/{}), retrying in {:?}",
                    url,
                    attempt,
                    MAX_GET_ATTEMPTS,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
                continue;
            }

            return Self::decode(outcome?, url).await;
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self.client.request(method, url).json(body).send().await?;
        Self::decode(response, url).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            return Ok(serde_json::from_str(&text)?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, url, &body))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn status_error(status: StatusCode, url: &str, body: &str) -> OptimizerError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => OptimizerError::Authentication(if detail.is_empty() {
            "bad credentials".to_string()
        } else {
            detail
        }),
        StatusCode::NOT_FOUND => OptimizerError::NotFound(url.to_string()),
        StatusCode::FORBIDDEN => OptimizerError::GitHub {
            status: status.as_u16(),
            message: format!(
                "rate limit exceeded or insufficient permissions ({})",
                detail
            ),
        },
        _ => OptimizerError::GitHub {
            status: status.as_u16(),
            message: detail,
        },
    }
}

/// Decode base64 file content as returned by the contents API (wrapped at 60 columns).
fn decode_content(encoded: &str) -> std::result::Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| format!("invalid base64 content: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("content is not UTF-8: {}", e))
}
