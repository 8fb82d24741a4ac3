use async_trait::async_trait;
use gha_relay_core::{BoxError, DispatchEnvelope, ReceiverRepo, RepositoryDispatch};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::value::RawValue;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com/";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("gha-relay/", env!("CARGO_PKG_VERSION"));

/// Client for the GitHub `repository_dispatch` REST endpoint.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: Url,
    token: String,
}

#[derive(Serialize)]
struct DispatchBody<'a> {
    event_type: &'a str,
    client_payload: &'a RawValue,
}

impl GitHubClient {
    /// Creates a new GitHub client with the provided token and API base URL.
    pub fn new(token: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    /// Triggers a `repository_dispatch` workflow run in `owner/repo`.
    ///
    /// GitHub answers `204 No Content` on success; any other status is an error.
    pub async fn repository_dispatch(
        &self,
        owner: &str,
        repo: &str,
        event_type: &str,
        client_payload: &RawValue,
    ) -> Result<(), GitHubError> {
        let url = self
            .base_url
            .join(&format!("repos/{owner}/{repo}/dispatches"))?;
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
            .json(&DispatchBody {
                event_type,
                client_payload,
            })
            .send()
            .await?;

        ensure_success(response).await
    }
}

#[async_trait]
impl RepositoryDispatch for GitHubClient {
    async fn dispatch(
        &self,
        repo: &ReceiverRepo,
        envelope: &DispatchEnvelope,
    ) -> Result<(), BoxError> {
        self.repository_dispatch(
            &repo.owner,
            &repo.name,
            envelope.event_type(),
            envelope.payload(),
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn ensure_success(response: Response) -> Result<(), GitHubError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(GitHubError::Status { status, body });
    }
    Ok(())
}
