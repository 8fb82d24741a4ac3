use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

pub const TYPE_URL_VERIFICATION: &str = "url_verification";
pub const TYPE_EVENT_CALLBACK: &str = "event_callback";
pub const SUBTYPE_REACTION_ADDED: &str = "reaction_added";

/// Errors that can occur while classifying an inbound Slack payload.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("failed to parse payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),
}

/// A parsed request body. The raw bytes are kept verbatim so they can be
/// forwarded downstream without re-serialization.
#[derive(Debug)]
pub struct InboundEvent {
    raw: Box<RawValue>,
    event_type: String,
    challenge: Option<String>,
    event: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    event: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct InnerEventHeader {
    #[serde(rename = "type")]
    event_type: String,
}

impl InboundEvent {
    /// Parses the envelope while keeping `raw` byte-for-byte.
    pub fn parse(raw: &[u8]) -> Result<Self, ClassifyError> {
        let raw: Box<RawValue> = serde_json::from_slice(raw)?;
        let envelope: Envelope = serde_json::from_str(raw.get())?;
        Ok(Self {
            raw,
            event_type: envelope.event_type,
            challenge: envelope.challenge,
            event: envelope.event,
        })
    }

    /// The request body exactly as received.
    pub fn raw(&self) -> &RawValue {
        &self.raw
    }

    /// Top-level `type` of the envelope.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// The item a reaction was attached to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionAddedEvent {
    pub user: String,
    pub reaction: String,
    #[serde(default)]
    pub item_user: Option<String>,
    pub item: ReactionItem,
    #[serde(default)]
    pub event_ts: String,
}

/// Inner events the relay knows how to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessEvent {
    ReactionAdded(ReactionAddedEvent),
}

impl BusinessEvent {
    /// Inner event `type` used in the dispatch event name.
    pub fn subtype(&self) -> &'static str {
        match self {
            Self::ReactionAdded(_) => SUBTYPE_REACTION_ADDED,
        }
    }
}

#[derive(Debug)]
pub enum ClassifiedEvent {
    /// Endpoint ownership check; answer with the challenge and do nothing else.
    Handshake { challenge: String },
    Business {
        inbound: InboundEvent,
        event: BusinessEvent,
    },
    /// Unknown top-level type, acknowledged without further action.
    Unhandled { event_type: String },
}

/// Body returned for a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub challenge: String,
}

/// Parses a raw Slack request body and decides what to do with it.
pub fn classify(raw: &[u8]) -> Result<ClassifiedEvent, ClassifyError> {
    let inbound = InboundEvent::parse(raw)?;
    match inbound.event_type.as_str() {
        TYPE_URL_VERIFICATION => {
            let challenge = inbound
                .challenge
                .ok_or(ClassifyError::MissingField("challenge"))?;
            Ok(ClassifiedEvent::Handshake { challenge })
        }
        TYPE_EVENT_CALLBACK => {
            let event = parse_business_event(&inbound)?;
            Ok(ClassifiedEvent::Business { inbound, event })
        }
        _ => Ok(ClassifiedEvent::Unhandled {
            event_type: inbound.event_type,
        }),
    }
}

fn parse_business_event(inbound: &InboundEvent) -> Result<BusinessEvent, ClassifyError> {
    let event = inbound
        .event
        .as_ref()
        .ok_or(ClassifyError::MissingField("event"))?;
    let header: InnerEventHeader = serde_json::from_str(event.get())?;
    match header.event_type.as_str() {
        SUBTYPE_REACTION_ADDED => {
            let reaction: ReactionAddedEvent = serde_json::from_str(event.get())?;
            Ok(BusinessEvent::ReactionAdded(reaction))
        }
        other => Err(ClassifyError::UnsupportedEventType(other.to_string())),
    }
}
