use async_trait::async_trait;
use gha_relay_core::{LookupError, SlackLookup, SlackMessage, UserProfile};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api/";

/// Client for the read-only Slack Web API methods used during enrichment.
#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl SlackClient {
    /// Creates a new Slack client with the provided bot token and API base URL.
    pub fn new(access_token: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            access_token: access_token.into(),
        }
    }

    /// Calls `team.info` for the workspace owning the access token.
    pub async fn team_info(&self) -> Result<TeamInfo, SlackError> {
        let url = self.base_url.join("team.info")?;
        let response: TeamInfoResponse = self.get(url).await?;
        Ok(response.team)
    }

    /// Calls `conversations.replies` for the message at `ts` in `channel`.
    pub async fn conversation_replies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let mut url = self.base_url.join("conversations.replies")?;
        url.query_pairs_mut()
            .append_pair("channel", channel)
            .append_pair("ts", ts);
        let response: RepliesResponse = self.get(url).await?;
        Ok(response.messages)
    }

    /// Calls `users.profile.get` for `user`.
    pub async fn user_profile(&self, user: &str) -> Result<UserProfile, SlackError> {
        let mut url = self.base_url.join("users.profile.get")?;
        url.query_pairs_mut().append_pair("user", user);
        let response: ProfileResponse = self.get(url).await?;
        Ok(response.profile)
    }

    async fn get<T>(&self, url: Url) -> Result<T, SlackError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;
        parse_api_response(response).await
    }
}

#[async_trait]
impl SlackLookup for SlackClient {
    async fn team_name(&self) -> Result<String, LookupError> {
        let team = self
            .team_info()
            .await
            .map_err(|err| LookupError::new("team.info", err))?;
        Ok(team.host_label().to_string())
    }

    async fn conversation_replies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<SlackMessage>, LookupError> {
        SlackClient::conversation_replies(self, channel, ts)
            .await
            .map_err(|err| LookupError::new("conversations.replies", err))
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, LookupError> {
        SlackClient::user_profile(self, user_id)
            .await
            .map_err(|err| LookupError::new("users.profile.get", err))
    }
}

/// Workspace metadata from `team.info`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
}

impl TeamInfo {
    /// Subdomain used in `<label>.slack.com`; the display name is only a fallback.
    pub fn host_label(&self) -> &str {
        if self.domain.is_empty() {
            &self.name
        } else {
            &self.domain
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamInfoResponse {
    team: TeamInfo,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile: UserProfile,
}

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("slack api error: {0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Slack answers 200 for most failures and reports them through `ok`/`error`.
async fn parse_api_response<T>(response: Response) -> Result<T, SlackError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(SlackError::Status { status, body });
    }

    let body: Value = response.json().await?;
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(SlackError::Api(reason.to_string()));
    }
    Ok(serde_json::from_value(body)?)
}
