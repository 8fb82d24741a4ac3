use thiserror::Error;
use tracing::debug;

use crate::event::ReactionAddedEvent;
use crate::lookup::{LookupError, SlackLookup};
use crate::permalink::{PermalinkError, PermalinkResolver, SlackUrlFragment, ThreadReply};

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("no message found at {channel}/{ts}")]
    NoMessage { channel: String, ts: String },
    #[error("message at {0} has no author")]
    MissingAuthor(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Permalink(#[from] PermalinkError),
}

/// Data gathered from Slack about the message a reaction was added to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEnrichment {
    pub user_name: String,
    pub text: String,
    pub link: String,
}

/// Resolves author, text and permalink of the reacted message.
///
/// Lookups run one after another; the permalink depends on the fetched
/// message's own thread information.
pub async fn enrich_reaction(
    lookup: &dyn SlackLookup,
    event: &ReactionAddedEvent,
) -> Result<ReactionEnrichment, EnrichError> {
    let channel = &event.item.channel;
    let ts = &event.item.ts;

    let messages = lookup.conversation_replies(channel, ts).await?;
    let message = messages.first().ok_or_else(|| EnrichError::NoMessage {
        channel: channel.clone(),
        ts: ts.clone(),
    })?;
    if messages.len() > 1 {
        debug!(stage = "enrich", count = messages.len(), "conversation has replies, using first message");
    }

    let author = message
        .user
        .as_deref()
        .or(event.item_user.as_deref())
        .ok_or_else(|| EnrichError::MissingAuthor(message.ts.clone()))?;
    let profile = lookup.user_profile(author).await?;

    let link = PermalinkResolver::new(lookup)
        .resolve(SlackUrlFragment {
            team_name: None,
            channel_id: channel.clone(),
            timestamp: message.ts.clone(),
            thread_timestamp: message.thread_ts.clone().unwrap_or_default(),
            thread_reply: ThreadReply::Unknown,
        })
        .await?;

    Ok(ReactionEnrichment {
        user_name: profile.preferred_name().to_string(),
        text: message.text.clone(),
        link,
    })
}
