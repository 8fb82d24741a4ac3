use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use gha_relay_core::{DispatchEnvelope, FanoutDispatcher, SignatureVerifier, SlackLookup};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::error;

use crate::error::ErrorResponse;
use crate::{kintone_events, slack_events, telemetry};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    verifier: SignatureVerifier,
    slack: Arc<dyn SlackLookup>,
    dispatcher: FanoutDispatcher,
    clock: Clock,
    request_timeout: Duration,
}

impl AppState {
    /// Builds the shared handler state with the system clock.
    pub fn new(
        metrics: PrometheusHandle,
        verifier: SignatureVerifier,
        slack: Arc<dyn SlackLookup>,
        dispatcher: FanoutDispatcher,
        request_timeout: Duration,
    ) -> Self {
        Self {
            metrics,
            verifier,
            slack,
            dispatcher,
            clock: Arc::new(Utc::now),
            request_timeout,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    pub fn slack(&self) -> &dyn SlackLookup {
        self.slack.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Fans the envelope out to every receiver and records the outcome.
    pub async fn dispatch(&self, envelope: &DispatchEnvelope) -> Result<(), ErrorResponse> {
        match self.dispatcher.dispatch(envelope).await {
            Ok(()) => {
                counter!("relay_dispatch_total", "result" => "ok").increment(1);
                Ok(())
            }
            Err(err) => {
                counter!("relay_dispatch_total", "result" => "error").increment(1);
                error!(stage = "dispatch", event_type = envelope.event_type(), error = %err, "fan-out failed");
                Err(ErrorResponse::internal(err.to_string()))
            }
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/slack/events/action", post(slack_events::handle))
        .route("/kintone/events/action", post(kintone_events::handle))
        .with_state(state)
}

async fn index() -> &'static str {
    "Hello, world"
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
