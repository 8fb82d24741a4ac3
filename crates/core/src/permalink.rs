use std::num::ParseIntError;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::lookup::{LookupError, SlackLookup};

#[derive(Debug, Error)]
pub enum PermalinkError {
    #[error("channel id is required")]
    MissingChannel,
    #[error("message timestamp is required")]
    MissingTimestamp,
    #[error("timestamp and thread timestamp are required for a thread reply")]
    MissingThreadTimestamps,
    #[error("thread timestamp must be empty for a message outside a thread")]
    UnexpectedThreadTimestamp,
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("retrieved message length is not 1 (got {0})")]
    MessageCount(usize),
    #[error("invalid team name {0:?}")]
    InvalidTeamName(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Whether the referenced message is known to be a reply inside a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThreadReply {
    Yes,
    No,
    #[default]
    Unknown,
}

/// Everything known about a message before its permalink is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackUrlFragment {
    pub team_name: Option<String>,
    pub channel_id: String,
    pub timestamp: String,
    pub thread_timestamp: String,
    pub thread_reply: ThreadReply,
}

/// Converts an integer timestamp (`1604223522001400`) into Slack's dotted
/// form (`1604223522.001400`). Dotted and empty values pass through.
pub fn normalize_timestamp(value: &str) -> Result<String, PermalinkError> {
    if value.is_empty() || value.contains('.') {
        return Ok(value.to_string());
    }
    let micros: u64 = value
        .parse()
        .map_err(|source| PermalinkError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })?;
    Ok(format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000))
}

/// Builds deep links to messages and thread replies.
pub struct PermalinkResolver<'a> {
    lookup: &'a dyn SlackLookup,
}

impl<'a> PermalinkResolver<'a> {
    /// Creates a resolver that falls back to `lookup` for missing metadata.
    pub fn new(lookup: &'a dyn SlackLookup) -> Self {
        Self { lookup }
    }

    /// Builds the permalink for `fragment`, fetching the team name and thread
    /// information when the fragment does not carry them.
    pub async fn resolve(&self, fragment: SlackUrlFragment) -> Result<String, PermalinkError> {
        let SlackUrlFragment {
            team_name,
            channel_id,
            timestamp,
            thread_timestamp,
            thread_reply,
        } = fragment;

        let team_name = match team_name.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => self.lookup.team_name().await?,
        };
        if channel_id.is_empty() {
            return Err(PermalinkError::MissingChannel);
        }

        let mut timestamp = normalize_timestamp(&timestamp)?;
        let mut thread_timestamp = normalize_timestamp(&thread_timestamp)?;

        match thread_reply {
            ThreadReply::Yes => {
                if timestamp.is_empty() || thread_timestamp.is_empty() {
                    return Err(PermalinkError::MissingThreadTimestamps);
                }
            }
            ThreadReply::No => {
                if !thread_timestamp.is_empty() {
                    return Err(PermalinkError::UnexpectedThreadTimestamp);
                }
            }
            ThreadReply::Unknown if !timestamp.is_empty() && !thread_timestamp.is_empty() => {}
            ThreadReply::Unknown => {
                if timestamp.is_empty() {
                    return Err(PermalinkError::MissingTimestamp);
                }
                let messages = self
                    .lookup
                    .conversation_replies(&channel_id, &timestamp)
                    .await?;
                let [message] = messages.as_slice() else {
                    return Err(PermalinkError::MessageCount(messages.len()));
                };
                if let Some(root) = message.reply_root() {
                    debug!(
                        stage = "enrich",
                        channel = %channel_id,
                        ts = %message.ts,
                        thread_ts = root,
                        "message is a thread reply"
                    );
                    thread_timestamp = root.to_string();
                    timestamp = message.ts.clone();
                }
            }
        }

        if timestamp.is_empty() {
            return Err(PermalinkError::MissingTimestamp);
        }
        compose_url(&team_name, &channel_id, &timestamp, &thread_timestamp)
    }
}

fn compose_url(
    team_name: &str,
    channel_id: &str,
    timestamp: &str,
    thread_timestamp: &str,
) -> Result<String, PermalinkError> {
    if !is_host_label(team_name) {
        return Err(PermalinkError::InvalidTeamName(team_name.to_string()));
    }
    let mut url = Url::parse(&format!("https://{team_name}.slack.com/"))
        .map_err(|_| PermalinkError::InvalidTeamName(team_name.to_string()))?;

    let is_reply = !thread_timestamp.is_empty() && thread_timestamp != timestamp;
    let anchor = if is_reply { thread_timestamp } else { timestamp };
    url.set_path(&format!(
        "/archives/{channel_id}/p{}",
        anchor.replacen('.', "", 1)
    ));
    if is_reply {
        url.query_pairs_mut().append_pair("thread_ts", timestamp);
    }
    Ok(url.to_string())
}

/// A single DNS label: ASCII alphanumerics and inner hyphens, at most 63 bytes.
fn is_host_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{SlackMessage, UserProfile};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Lookup returning canned data and recording every call.
    #[derive(Default)]
    struct FakeLookup {
        team: String,
        team_unavailable: bool,
        messages: Vec<SlackMessage>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SlackLookup for FakeLookup {
        async fn team_name(&self) -> Result<String, LookupError> {
            self.calls.lock().unwrap().push("team_name".to_string());
            if self.team_unavailable {
                return Err(LookupError::new("team.info", "invalid_auth"));
            }
            Ok(self.team.clone())
        }

        async fn conversation_replies(
            &self,
            channel: &str,
            ts: &str,
        ) -> Result<Vec<SlackMessage>, LookupError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("conversation_replies {channel} {ts}"));
            Ok(self.messages.clone())
        }

        async fn user_profile(&self, _user_id: &str) -> Result<UserProfile, LookupError> {
            Ok(UserProfile::default())
        }
    }

    fn fragment(ts: &str, thread_ts: &str, thread_reply: ThreadReply) -> SlackUrlFragment {
        SlackUrlFragment {
            team_name: Some("vvakame".to_string()),
            channel_id: "C01DAR4CQCX".to_string(),
            timestamp: ts.to_string(),
            thread_timestamp: thread_ts.to_string(),
            thread_reply,
        }
    }

    async fn resolve(lookup: &FakeLookup, fragment: SlackUrlFragment) -> Result<String, PermalinkError> {
        PermalinkResolver::new(lookup).resolve(fragment).await
    }

    #[test]
    fn normalizes_integer_and_dotted_timestamps_identically() {
        assert_eq!(
            normalize_timestamp("1604223522001400").unwrap(),
            "1604223522.001400"
        );
        assert_eq!(
            normalize_timestamp("1604223522.001400").unwrap(),
            "1604223522.001400"
        );
        assert_eq!(normalize_timestamp("42").unwrap(), "0.000042");
        assert_eq!(normalize_timestamp("").unwrap(), "");
        assert!(matches!(
            normalize_timestamp("16042235x2"),
            Err(PermalinkError::InvalidTimestamp { .. })
        ));
    }

    #[tokio::test]
    async fn plain_message_links_to_its_own_timestamp() {
        let lookup = FakeLookup::default();
        for ts in ["1604223522001400", "1604223522.001400"] {
            let url = resolve(&lookup, fragment(ts, "", ThreadReply::No))
                .await
                .expect("resolve");
            assert_eq!(
                url,
                "https://vvakame.slack.com/archives/C01DAR4CQCX/p1604223522001400"
            );
        }
        assert!(lookup.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn thread_parent_with_same_thread_ts_has_no_query() {
        let lookup = FakeLookup::default();
        let url = resolve(
            &lookup,
            fragment("1604223522.001400", "1604223522.001400", ThreadReply::Unknown),
        )
        .await
        .expect("resolve");
        assert_eq!(
            url,
            "https://vvakame.slack.com/archives/C01DAR4CQCX/p1604223522001400"
        );
        assert!(lookup.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn thread_reply_links_to_root_with_thread_ts() {
        let lookup = FakeLookup::default();
        for (ts, thread_ts) in [
            ("1604223522001400", "1604223531001700"),
            ("1604223522.001400", "1604223531.001700"),
        ] {
            let url = resolve(&lookup, fragment(ts, thread_ts, ThreadReply::Yes))
                .await
                .expect("resolve");
            assert_eq!(
                url,
                "https://vvakame.slack.com/archives/C01DAR4CQCX/p1604223531001700?thread_ts=1604223522.001400"
            );
        }
    }

    #[tokio::test]
    async fn rejects_inconsistent_thread_flags() {
        let lookup = FakeLookup::default();
        let err = resolve(&lookup, fragment("1604223522001400", "", ThreadReply::Yes))
            .await
            .expect_err("reply without thread ts");
        assert!(matches!(err, PermalinkError::MissingThreadTimestamps));

        let err = resolve(
            &lookup,
            fragment("1604223522001400", "1604223531001700", ThreadReply::No),
        )
        .await
        .expect_err("non-reply with thread ts");
        assert!(matches!(err, PermalinkError::UnexpectedThreadTimestamp));
    }

    #[tokio::test]
    async fn rejects_missing_channel_and_bad_timestamps() {
        let lookup = FakeLookup::default();
        let mut missing_channel = fragment("1604223522001400", "", ThreadReply::No);
        missing_channel.channel_id.clear();
        assert!(matches!(
            resolve(&lookup, missing_channel).await,
            Err(PermalinkError::MissingChannel)
        ));

        assert!(matches!(
            resolve(&lookup, fragment("abc", "", ThreadReply::No)).await,
            Err(PermalinkError::InvalidTimestamp { .. })
        ));
    }

    #[tokio::test]
    async fn fetches_team_name_when_absent() {
        let lookup = FakeLookup {
            team: "acme".to_string(),
            ..FakeLookup::default()
        };
        let mut without_team = fragment("1604223522.001400", "", ThreadReply::No);
        without_team.team_name = None;

        let url = resolve(&lookup, without_team).await.expect("resolve");
        assert_eq!(url, "https://acme.slack.com/archives/C01DAR4CQCX/p1604223522001400");
        assert_eq!(*lookup.calls.lock().unwrap(), vec!["team_name".to_string()]);
    }

    #[tokio::test]
    async fn unknown_thread_status_adopts_fetched_reply() {
        let lookup = FakeLookup {
            messages: vec![SlackMessage {
                ts: "1604223531.001700".to_string(),
                thread_ts: Some("1604223522.001400".to_string()),
                ..SlackMessage::default()
            }],
            ..FakeLookup::default()
        };
        let url = resolve(&lookup, fragment("1604223531001700", "", ThreadReply::Unknown))
            .await
            .expect("resolve");
        assert_eq!(
            url,
            "https://vvakame.slack.com/archives/C01DAR4CQCX/p1604223522001400?thread_ts=1604223531.001700"
        );
        assert_eq!(
            *lookup.calls.lock().unwrap(),
            vec!["conversation_replies C01DAR4CQCX 1604223531.001700".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_thread_status_keeps_plain_message() {
        let lookup = FakeLookup {
            messages: vec![SlackMessage {
                ts: "1604223522.001400".to_string(),
                ..SlackMessage::default()
            }],
            ..FakeLookup::default()
        };
        let url = resolve(&lookup, fragment("1604223522.001400", "", ThreadReply::Unknown))
            .await
            .expect("resolve");
        assert_eq!(
            url,
            "https://vvakame.slack.com/archives/C01DAR4CQCX/p1604223522001400"
        );
    }

    #[tokio::test]
    async fn unknown_thread_status_requires_exactly_one_message() {
        let none = FakeLookup::default();
        let err = resolve(&none, fragment("1604223522.001400", "", ThreadReply::Unknown))
            .await
            .expect_err("zero messages");
        assert!(matches!(err, PermalinkError::MessageCount(0)));

        let many = FakeLookup {
            messages: vec![SlackMessage::default(), SlackMessage::default()],
            ..FakeLookup::default()
        };
        let err = resolve(&many, fragment("1604223522.001400", "", ThreadReply::Unknown))
            .await
            .expect_err("two messages");
        assert!(matches!(err, PermalinkError::MessageCount(2)));
        assert!(err.to_string().starts_with("retrieved message length is not 1"));
    }

    #[tokio::test]
    async fn rejects_malformed_thread_timestamp() {
        let lookup = FakeLookup::default();
        let err = resolve(&lookup, fragment("1604223522001400", "x1", ThreadReply::Yes))
            .await
            .expect_err("bad thread ts");
        assert!(matches!(err, PermalinkError::InvalidTimestamp { ref value, .. } if value == "x1"));
    }

    #[tokio::test]
    async fn team_lookup_failure_is_reported() {
        let lookup = FakeLookup {
            team_unavailable: true,
            ..FakeLookup::default()
        };
        let mut without_team = fragment("1604223522.001400", "", ThreadReply::No);
        without_team.team_name = None;

        let err = resolve(&lookup, without_team).await.expect_err("lookup fails");
        match err {
            PermalinkError::Lookup(source) => assert_eq!(source.operation, "team.info"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn team_names_must_be_a_single_host_label() {
        for team in ["evil.com/x", "user@evil.com", "evil.com:443", "a.b", "-lead", "trail-", "sp ace"] {
            let lookup = FakeLookup::default();
            let mut with_team = fragment("1604223522.001400", "", ThreadReply::No);
            with_team.team_name = Some(team.to_string());
            let err = resolve(&lookup, with_team).await.expect_err(team);
            assert!(
                matches!(err, PermalinkError::InvalidTeamName(ref name) if name == team),
                "{team}: {err:?}"
            );
        }

        let lookup = FakeLookup::default();
        let mut hyphenated = fragment("1604223522.001400", "", ThreadReply::No);
        hyphenated.team_name = Some("wakame-lab2".to_string());
        let url = resolve(&lookup, hyphenated).await.expect("resolve");
        assert_eq!(url, "https://wakame-lab2.slack.com/archives/C01DAR4CQCX/p1604223522001400");
    }
}
