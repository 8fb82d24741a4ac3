//! In-memory collaborators shared by the handler tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gha_relay_core::{
    BoxError, DispatchEnvelope, FanoutDispatcher, LookupError, ReceiverRepo, RepositoryDispatch,
    SignatureVerifier, SlackLookup, SlackMessage, UserProfile,
};

use crate::router::AppState;
use crate::telemetry;

const SECRET: &[u8] = b"8f742231b10e8888abcd99yyyzzz85a5";
const FIXED_NOW: &str = "2020-11-01T09:40:00Z";

#[derive(Clone, Default)]
pub struct FakeSlack {
    team: String,
    messages: HashMap<String, Vec<SlackMessage>>,
    profiles: HashMap<String, UserProfile>,
    delay: Option<Duration>,
}

impl FakeSlack {
    pub fn new(team: &str) -> Self {
        Self {
            team: team.to_string(),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, channel: &str, message: SlackMessage) -> Self {
        self.messages
            .entry(channel.to_string())
            .or_default()
            .push(message);
        self
    }

    pub fn with_profile(mut self, user: &str, profile: UserProfile) -> Self {
        self.profiles.insert(user.to_string(), profile);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SlackLookup for FakeSlack {
    async fn team_name(&self) -> Result<String, LookupError> {
        self.pause().await;
        Ok(self.team.clone())
    }

    async fn conversation_replies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<SlackMessage>, LookupError> {
        self.pause().await;
        Ok(self
            .messages
            .get(channel)
            .map(|messages| messages.iter().filter(|m| m.ts == ts).cloned().collect())
            .unwrap_or_default())
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, LookupError> {
        self.pause().await;
        self.profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| LookupError::new("users.profile.get", "user_not_found"))
    }
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub repo: String,
    pub event_type: String,
    pub payload: String,
}

#[derive(Default)]
pub struct FakeReceiver {
    failing_owner: Option<String>,
    delay: Option<Duration>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl FakeReceiver {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryDispatch for FakeReceiver {
    async fn dispatch(
        &self,
        repo: &ReceiverRepo,
        envelope: &DispatchEnvelope,
    ) -> Result<(), BoxError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_owner.as_deref() == Some(repo.owner.as_str()) {
            return Err("unexpected status 404 Not Found: {\"message\":\"Not Found\"}".into());
        }
        self.deliveries.lock().unwrap().push(Delivery {
            repo: repo.to_string(),
            event_type: envelope.event_type().to_string(),
            payload: envelope.payload().get().to_string(),
        });
        Ok(())
    }
}

pub struct TestContext {
    pub state: AppState,
    pub receiver: Arc<FakeReceiver>,
    pub now: DateTime<Utc>,
    slack: FakeSlack,
    timeout: Duration,
}

impl TestContext {
    pub fn new() -> Self {
        let now = DateTime::parse_from_rfc3339(FIXED_NOW)
            .expect("fixed time")
            .with_timezone(&Utc);
        Self::build(
            FakeSlack::new("vvakame"),
            Arc::new(FakeReceiver::default()),
            Duration::from_secs(5),
            now,
        )
    }

    fn build(
        slack: FakeSlack,
        receiver: Arc<FakeReceiver>,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let verifier = SignatureVerifier::new(Arc::from(SECRET.to_vec().into_boxed_slice()));
        let receivers = vec![
            ReceiverRepo::new("vvakame", "workflows"),
            ReceiverRepo::new("octo", "notes"),
        ];
        let dispatcher =
            FanoutDispatcher::new(receiver.clone(), receivers).expect("dispatcher");
        let state = AppState::new(
            metrics,
            verifier,
            Arc::new(slack.clone()),
            dispatcher,
            timeout,
        )
        .with_clock(Arc::new(move || now));

        Self {
            state,
            receiver,
            now,
            slack,
            timeout,
        }
    }

    pub fn with_slack(self, slack: FakeSlack) -> Self {
        let receiver = self.receiver.clone();
        Self::build(slack, receiver, self.timeout, self.now)
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let receiver = self.receiver.clone();
        Self::build(self.slack, receiver, timeout, self.now)
    }

    pub fn with_failing_receiver(self, owner: &str) -> Self {
        let receiver = Arc::new(FakeReceiver {
            failing_owner: Some(owner.to_string()),
            ..FakeReceiver::default()
        });
        Self::build(self.slack, receiver, self.timeout, self.now)
    }

    pub fn with_receiver_delay(self, delay: Duration) -> Self {
        let receiver = Arc::new(FakeReceiver {
            delay: Some(delay),
            ..FakeReceiver::default()
        });
        Self::build(self.slack, receiver, self.timeout, self.now)
    }

    pub fn timestamp(&self) -> String {
        self.now.timestamp().to_string()
    }

    pub fn sign(&self, timestamp: &str, body: &str) -> String {
        self.state
            .verifier()
            .compute_signature(timestamp, body.as_bytes())
            .expect("signature")
    }
}
