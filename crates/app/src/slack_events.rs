use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gha_relay_core::{
    classify, enrich_reaction, event::InboundEvent, reaction_added_request,
    signature::{HEADER_SIGNATURE, HEADER_TIMESTAMP},
    BusinessEvent, ClassifiedEvent, DispatchEnvelope, HandshakeResponse,
};
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::error::ErrorResponse;
use crate::router::AppState;

const SOURCE: &str = "slack";

/// Handles `POST /slack/events/action`.
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ErrorResponse> {
    let start = Instant::now();
    let result = process(&state, &headers, &body).await;
    histogram!("webhook_ack_latency_seconds", "source" => SOURCE)
        .record(start.elapsed().as_secs_f64());
    if let Err(err) = &result {
        warn!(stage = "ingress", source = SOURCE, status = %err.status(), "request rejected");
    }
    result
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ErrorResponse> {
    let timestamp = header_value(headers, HEADER_TIMESTAMP);
    let signature = header_value(headers, HEADER_SIGNATURE);
    state
        .verifier()
        .verify(timestamp, signature, body, state.now())
        .map_err(|err| {
            counter!("relay_invalid_signature_total").increment(1);
            warn!(stage = "ingress", source = SOURCE, error = %err, "signature verification failed");
            ErrorResponse::bad_request(err.to_string())
        })?;

    let classified = classify(body).map_err(|err| {
        warn!(stage = "classify", error = %err, "failed to classify payload");
        ErrorResponse::bad_request(err.to_string())
    })?;

    match classified {
        ClassifiedEvent::Handshake { challenge } => {
            counter!("relay_ingress_total", "source" => SOURCE, "type" => "url_verification")
                .increment(1);
            info!(stage = "classify", "answering url verification");
            Ok(Json(HandshakeResponse { challenge }).into_response())
        }
        ClassifiedEvent::Unhandled { event_type } => {
            counter!("relay_ingress_total", "source" => SOURCE, "type" => "unhandled")
                .increment(1);
            info!(stage = "classify", %event_type, "ignoring unknown event type");
            Ok(StatusCode::OK.into_response())
        }
        ClassifiedEvent::Business { inbound, event } => {
            counter!("relay_ingress_total", "source" => SOURCE, "type" => event.subtype())
                .increment(1);
            tokio::time::timeout(state.request_timeout(), relay(state, &inbound, event))
                .await
                .map_err(|_| {
                    warn!(stage = "dispatch", source = SOURCE, "request deadline exceeded");
                    ErrorResponse::timeout()
                })??;
            Ok(StatusCode::OK.into_response())
        }
    }
}

async fn relay(
    state: &AppState,
    inbound: &InboundEvent,
    event: BusinessEvent,
) -> Result<(), ErrorResponse> {
    let request = match event {
        BusinessEvent::ReactionAdded(reaction) => {
            let enrichment = enrich_reaction(state.slack(), &reaction)
                .await
                .map_err(|err| {
                    warn!(stage = "enrich", channel = %reaction.item.channel, ts = %reaction.item.ts, error = %err, "enrichment failed");
                    ErrorResponse::bad_request(err.to_string())
                })?;
            reaction_added_request(inbound, &reaction, enrichment)
        }
    };

    let envelope = DispatchEnvelope::from_request(&request)
        .map_err(|err| ErrorResponse::bad_request(err.to_string()))?;
    state.dispatch(&envelope).await
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
