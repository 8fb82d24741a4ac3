use std::{fmt, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use crate::lookup::BoxError;
use crate::transform::DispatchEnvelope;

/// One downstream repository receiving dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiverRepo {
    pub owner: String,
    pub name: String,
}

impl ReceiverRepo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ReceiverRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReceiverParseError {
    #[error("invalid receiver syntax {0:?}, expected owner/name")]
    InvalidSyntax(String),
    #[error("receiver list is empty")]
    Empty,
}

/// Parses a comma separated `owner/name` list. Blank entries are skipped.
pub fn parse_receiver_repos(value: &str) -> Result<Vec<ReceiverRepo>, ReceiverParseError> {
    let mut repos = Vec::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (owner, name) = entry
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| ReceiverParseError::InvalidSyntax(entry.to_string()))?;
        repos.push(ReceiverRepo::new(owner, name));
    }

    if repos.is_empty() {
        return Err(ReceiverParseError::Empty);
    }
    Ok(repos)
}

/// Delivers one envelope to one repository.
#[async_trait]
pub trait RepositoryDispatch: Send + Sync {
    async fn dispatch(&self, repo: &ReceiverRepo, envelope: &DispatchEnvelope)
        -> Result<(), BoxError>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("at least one receiver repository is required")]
    NoReceivers,
    #[error("dispatch to {repo} failed: {source}")]
    Receiver {
        repo: ReceiverRepo,
        #[source]
        source: BoxError,
    },
    #[error("dispatch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Sends every envelope to all configured receivers concurrently.
#[derive(Clone)]
pub struct FanoutDispatcher {
    client: Arc<dyn RepositoryDispatch>,
    receivers: Arc<[ReceiverRepo]>,
}

impl FanoutDispatcher {
    /// Creates a dispatcher; at least one receiver is required.
    pub fn new(
        client: Arc<dyn RepositoryDispatch>,
        receivers: Vec<ReceiverRepo>,
    ) -> Result<Self, DispatchError> {
        if receivers.is_empty() {
            return Err(DispatchError::NoReceivers);
        }
        Ok(Self {
            client,
            receivers: receivers.into(),
        })
    }

    /// Configured receivers, in configuration order.
    pub fn receivers(&self) -> &[ReceiverRepo] {
        &self.receivers
    }

    /// Dispatches to every receiver and waits for all of them.
    ///
    /// Each delivery runs to completion regardless of its siblings; the first
    /// failure observed is returned once all have finished.
    pub async fn dispatch(&self, envelope: &DispatchEnvelope) -> Result<(), DispatchError> {
        debug!(
            stage = "dispatch",
            event_type = envelope.event_type(),
            payload = envelope.payload().get(),
            "dispatching event"
        );

        let envelope = Arc::new(envelope.clone());
        let mut tasks = JoinSet::new();
        for repo in self.receivers.iter().cloned() {
            let client = Arc::clone(&self.client);
            let envelope = Arc::clone(&envelope);
            tasks.spawn(
                async move {
                    debug!(stage = "dispatch", receiver = %repo, "dispatch event");
                    let result = client.dispatch(&repo, &envelope).await;
                    (repo, result)
                }
                .in_current_span(),
            );
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((repo, Ok(()))) => {
                    info!(stage = "dispatch", receiver = %repo, event_type = envelope.event_type(), "dispatched");
                    continue;
                }
                Ok((repo, Err(source))) => {
                    warn!(stage = "dispatch", receiver = %repo, event_type = envelope.event_type(), error = %source, "dispatch failed");
                    DispatchError::Receiver { repo, source }
                }
                Err(err) => {
                    warn!(stage = "dispatch", error = %err, "dispatch task aborted");
                    DispatchError::Task(err)
                }
            };
            first_error.get_or_insert(outcome);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
