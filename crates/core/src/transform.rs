use serde::Serialize;
use serde_json::value::{to_raw_value, RawValue};
use thiserror::Error;

use crate::enrich::ReactionEnrichment;
use crate::event::{InboundEvent, ReactionAddedEvent, SUBTYPE_REACTION_ADDED};
use crate::kintone::KintoneEvent;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("dispatch event type must not be empty")]
    EmptyEventType,
    #[error("failed to serialize dispatch payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A source-specific event ready to be turned into a repository dispatch.
pub trait DispatchRequest {
    fn event_type(&self) -> String;
    fn payload(&self) -> Result<Box<RawValue>, serde_json::Error>;
}

/// Fully built dispatch: a non-empty event type plus a valid JSON payload.
#[derive(Debug, Clone)]
pub struct DispatchEnvelope {
    event_type: String,
    payload: Box<RawValue>,
}

impl DispatchEnvelope {
    /// Validates the event type and serializes the payload of `request`.
    pub fn from_request(request: &dyn DispatchRequest) -> Result<Self, TransformError> {
        let event_type = request.event_type();
        if event_type.trim().is_empty() {
            return Err(TransformError::EmptyEventType);
        }
        let payload = request.payload()?;
        Ok(Self {
            event_type,
            payload,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &RawValue {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionAddedDispatch {
    pub user_name: String,
    pub text: String,
    pub reaction: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackDispatchRequest {
    pub slack_event: Box<RawValue>,
    pub slack_event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_added: Option<ReactionAddedDispatch>,
}

impl DispatchRequest for SlackDispatchRequest {
    fn event_type(&self) -> String {
        format!("slack-event-{}", self.slack_event_type)
    }

    fn payload(&self) -> Result<Box<RawValue>, serde_json::Error> {
        to_raw_value(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KintoneDispatchRequest {
    pub kintone_event: KintoneEvent,
    pub kintone_event_raw: Box<RawValue>,
}

impl DispatchRequest for KintoneDispatchRequest {
    fn event_type(&self) -> String {
        format!(
            "kintone-event-{}-{}",
            self.kintone_event.app.id, self.kintone_event.event_type
        )
    }

    fn payload(&self) -> Result<Box<RawValue>, serde_json::Error> {
        to_raw_value(self)
    }
}

/// Maps an enriched `reaction_added` event onto its dispatch request.
pub fn reaction_added_request(
    inbound: &InboundEvent,
    event: &ReactionAddedEvent,
    enrichment: ReactionEnrichment,
) -> SlackDispatchRequest {
    SlackDispatchRequest {
        slack_event: inbound.raw().to_owned(),
        slack_event_type: format!("{SUBTYPE_REACTION_ADDED}-{}", event.reaction),
        reaction_added: Some(ReactionAddedDispatch {
            user_name: enrichment.user_name,
            text: enrichment.text,
            reaction: event.reaction.clone(),
            link: enrichment.link,
        }),
    }
}
