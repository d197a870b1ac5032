use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{Repository, Token};
use crate::error::{DelegateError, Result};
use crate::reporter::Reporter;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "copilot-delegate";

/// Pull request to open.
#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub body: &'a str,
}

/// A pull request as created on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRecord {
    pub number: u64,
    pub html_url: String,
    pub head_branch: String,
    pub base_branch: String,
    pub title: String,
    pub body: String,
    /// Set once the actor has been assigned.
    pub assignee: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPull {
    number: u64,
    #[serde(default)]
    html_url: String,
}

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

/// Minimal REST client for the two calls the pipeline makes.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    repository: Repository,
    token: Token,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("repository", &self.repository)
            .finish()
    }
}

impl GitHubClient {
    pub fn new(api_url: &str, repository: Repository, token: Token) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository,
            token,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Open a pull request. Any failure is logged and reported, and yields
    /// `None` so the caller can skip the steps that need a PR number.
    pub async fn create_pull_request(
        &self,
        pr: &NewPullRequest<'_>,
        reporter: &dyn Reporter,
    ) -> Option<PullRequestRecord> {
        match self.try_create_pull_request(pr).await {
            Ok(record) => {
                tracing::info!(number = record.number, url = %record.html_url, "pull request created");
                reporter.info(&format!("Created pull request: {}", record.html_url));
                Some(record)
            }
            Err(e) => {
                tracing::error!(head = pr.head, base = pr.base, error = %e, "failed to create pull request");
                reporter.error(&format!("Failed to create pull request: {e}"));
                None
            }
        }
    }

    async fn try_create_pull_request(&self, pr: &NewPullRequest<'_>) -> Result<PullRequestRecord> {
        let path = format!(
            "/repos/{}/{}/pulls",
            self.repository.owner, self.repository.name
        );
        let resp = self.request(Method::POST, &path).json(pr).send().await?;
        let created: CreatedPull = ensure_success(resp).await?.json().await?;
        Ok(PullRequestRecord {
            number: created.number,
            html_url: created.html_url,
            head_branch: pr.head.to_string(),
            base_branch: pr.base.to_string(),
            title: pr.title.to_string(),
            body: pr.body.to_string(),
            assignee: None,
        })
    }

    /// Add `assignee` to the pull request. Failures become warnings and
    /// return `false`.
    pub async fn assign_pull_request(
        &self,
        number: u64,
        assignee: &str,
        reporter: &dyn Reporter,
    ) -> bool {
        match self.try_assign(number, assignee).await {
            Ok(()) => {
                tracing::info!(number, assignee, "pull request assigned");
                true
            }
            Err(e) => {
                tracing::warn!(number, assignee, error = %e, "failed to assign pull request");
                reporter.warning(&format!("Failed to assign PR #{number} to {assignee}: {e}"));
                false
            }
        }
    }

    async fn try_assign(&self, number: u64, assignee: &str) -> Result<()> {
        let path = format!(
            "/repos/{}/{}/issues/{number}/assignees",
            self.repository.owner, self.repository.name
        );
        let resp = self
            .request(Method::POST, &path)
            .json(&json!({ "assignees": [assignee] }))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.token.expose()))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

/// Turn a non-2xx response into an error carrying GitHub's `message`.
async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
        .unwrap_or(body);
    Err(DelegateError::GitHub(format!("{status}: {message}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> GitHubClient {
        GitHubClient::new(
            &server.url(),
            "octo/widgets".parse().unwrap(),
            Token::new("t0ken"),
        )
        .unwrap()
    }

    fn new_pr() -> NewPullRequest<'static> {
        NewPullRequest {
            title: "Copilot delegate",
            head: "copilot/delegate-1",
            base: "main",
            body: "body",
        }
    }

    #[tokio::test]
    async fn create_returns_number_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/pulls")
            .match_header("authorization", "Bearer t0ken")
            .match_header("accept", "application/vnd.github+json")
            .match_body(Matcher::PartialJson(json!({
                "head": "copilot/delegate-1",
                "base": "main",
                "title": "Copilot delegate",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"number":42,"html_url":"https://github.com/octo/widgets/pull/42"}"#)
            .create_async()
            .await;

        let reporter = RecordingReporter::default();
        let record = client(&server)
            .create_pull_request(&new_pr(), &reporter)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.number, 42);
        assert_eq!(record.html_url, "https://github.com/octo/widgets/pull/42");
        assert_eq!(record.head_branch, "copilot/delegate-1");
        assert_eq!(record.base_branch, "main");
        assert_eq!(record.assignee, None);
    }

    #[tokio::test]
    async fn create_returns_none_on_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octo/widgets/pulls")
            .with_status(422)
            .with_body(r#"{"message":"Validation Failed"}"#)
            .create_async()
            .await;

        let reporter = RecordingReporter::default();
        let record = client(&server).create_pull_request(&new_pr(), &reporter).await;

        assert!(record.is_none());
        let errors = reporter.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Validation Failed"), "{}", errors[0]);
        assert!(!errors[0].contains("t0ken"));
    }

    #[tokio::test]
    async fn create_returns_none_when_unreachable() {
        let reporter = RecordingReporter::default();
        let gh = GitHubClient::new(
            "http://127.0.0.1:1",
            "octo/widgets".parse().unwrap(),
            Token::new("t"),
        )
        .unwrap();
        assert!(gh.create_pull_request(&new_pr(), &reporter).await.is_none());
    }

    #[tokio::test]
    async fn assign_posts_actor() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/issues/42/assignees")
            .match_body(Matcher::Json(json!({ "assignees": ["monalisa"] })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let reporter = RecordingReporter::default();
        assert!(
            client(&server)
                .assign_pull_request(42, "monalisa", &reporter)
                .await
        );

        mock.assert_async().await;
        assert!(reporter.warnings().is_empty());
    }

    #[tokio::test]
    async fn assign_failure_is_a_warning() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octo/widgets/issues/42/assignees")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let reporter = RecordingReporter::default();
        assert!(
            !client(&server)
                .assign_pull_request(42, "monalisa", &reporter)
                .await
        );

        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Not Found"));
    }
}
