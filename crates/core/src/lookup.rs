use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a Slack metadata lookup.
#[derive(Debug, Error)]
#[error("{operation} failed: {source}")]
pub struct LookupError {
    pub operation: &'static str,
    #[source]
    pub source: BoxError,
}

impl LookupError {
    /// Wraps `source` with the name of the API method that failed.
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

/// A single message as returned by a conversation lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlackMessage {
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl SlackMessage {
    /// Returns the thread root timestamp when the message is a reply to another message.
    pub fn reply_root(&self) -> Option<&str> {
        self.thread_ts
            .as_deref()
            .filter(|root| !root.is_empty() && *root != self.ts)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub real_name: String,
}

impl UserProfile {
    /// Display name, falling back to the real name when the former is empty.
    pub fn preferred_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.real_name
        } else {
            &self.display_name
        }
    }
}

/// Read-only Slack metadata needed to enrich events.
#[async_trait]
pub trait SlackLookup: Send + Sync {
    /// Host label of the workspace, as used in `<team>.slack.com`.
    async fn team_name(&self) -> Result<String, LookupError>;

    /// Messages of the conversation anchored at `ts` in `channel`.
    async fn conversation_replies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<SlackMessage>, LookupError>;

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, LookupError>;
}
