//! Event authentication and redispatch pipeline.
//!
//! Requests flow through [`signature`] verification, [`event`]
//! classification, [`enrich`]ment (which uses [`permalink`] to build message
//! links), [`transform`]ation into a [`transform::DispatchEnvelope`], and
//! finally [`dispatch`] fan-out to every receiver repository. Network access
//! happens only through the [`lookup::SlackLookup`] and
//! [`dispatch::RepositoryDispatch`] traits.

pub mod dispatch;
pub mod enrich;
pub mod event;
pub mod kintone;
pub mod lookup;
pub mod permalink;
pub mod signature;
pub mod transform;

pub use dispatch::{
    parse_receiver_repos, DispatchError, FanoutDispatcher, ReceiverParseError, ReceiverRepo,
    RepositoryDispatch,
};
pub use enrich::{enrich_reaction, EnrichError, ReactionEnrichment};
pub use event::{classify, BusinessEvent, ClassifiedEvent, ClassifyError, HandshakeResponse};
pub use kintone::KintoneEvent;
pub use lookup::{BoxError, LookupError, SlackLookup, SlackMessage, UserProfile};
pub use permalink::{PermalinkError, PermalinkResolver, SlackUrlFragment, ThreadReply};
pub use signature::{SignatureError, SignatureVerifier};
pub use transform::{
    reaction_added_request, DispatchEnvelope, DispatchRequest, KintoneDispatchRequest,
    SlackDispatchRequest, TransformError,
};
