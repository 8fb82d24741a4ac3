use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gha_relay_core::{DispatchEnvelope, KintoneDispatchRequest, KintoneEvent};
use metrics::{counter, histogram};
use serde_json::value::RawValue;
use tracing::{info, warn};

use crate::error::ErrorResponse;
use crate::router::AppState;

const SOURCE: &str = "kintone";

/// Handles `POST /kintone/events/action`. kintone does not sign its webhooks.
pub async fn handle(State(state): State<AppState>, body: Bytes) -> Result<Response, ErrorResponse> {
    let start = Instant::now();
    let result = process(&state, &body).await;
    histogram!("webhook_ack_latency_seconds", "source" => SOURCE)
        .record(start.elapsed().as_secs_f64());
    if let Err(err) = &result {
        warn!(stage = "ingress", source = SOURCE, status = %err.status(), "request rejected");
    }
    result
}

async fn process(state: &AppState, body: &[u8]) -> Result<Response, ErrorResponse> {
    let invalid = |err: serde_json::Error| {
        warn!(stage = "classify", source = SOURCE, error = %err, "malformed kintone payload");
        ErrorResponse::bad_request(format!("failed to parse payload: {err}"))
    };
    let kintone_event = KintoneEvent::parse(body).map_err(invalid)?;
    let kintone_event_raw: Box<RawValue> = serde_json::from_slice(body).map_err(invalid)?;

    counter!("relay_ingress_total", "source" => SOURCE, "type" => type_label(&kintone_event.event_type))
        .increment(1);
    info!(
        stage = "classify",
        app_id = %kintone_event.app.id,
        event_type = %kintone_event.event_type,
        "kintone event received"
    );

    let request = KintoneDispatchRequest {
        kintone_event,
        kintone_event_raw,
    };
    let envelope = DispatchEnvelope::from_request(&request)
        .map_err(|err| ErrorResponse::bad_request(err.to_string()))?;

    tokio::time::timeout(state.request_timeout(), state.dispatch(&envelope))
        .await
        .map_err(|_| {
            warn!(stage = "dispatch", source = SOURCE, "request deadline exceeded");
            ErrorResponse::timeout()
        })??;
    Ok(StatusCode::OK.into_response())
}

/// Metric label for a webhook `type`; unknown values collapse into `other`.
fn type_label(event_type: &str) -> &'static str {
    match event_type {
        "ADD_RECORD" => "ADD_RECORD",
        "UPDATE_RECORD" => "UPDATE_RECORD",
        "DELETE_RECORD" => "DELETE_RECORD",
        "UPDATE_STATUS" => "UPDATE_STATUS",
        "ADD_RECORD_COMMENT" => "ADD_RECORD_COMMENT",
        _ => "other",
    }
}
