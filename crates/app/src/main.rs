mod error;
mod kintone_events;
mod router;
mod slack_events;
mod telemetry;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, sync::Arc};

use gha_relay_core::{FanoutDispatcher, SignatureVerifier};
use gha_relay_github::GitHubClient;
use gha_relay_slack::SlackClient;
use gha_relay_util::{load_env_file, AppConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    let slack = SlackClient::new(
        config.slack_access_token.expose(),
        config.slack_api_base_url.clone(),
        http.clone(),
    );
    let github = GitHubClient::new(
        config.gha_repo_token.expose(),
        config.github_api_base_url.clone(),
        http,
    );
    let dispatcher = FanoutDispatcher::new(Arc::new(github), config.receivers.clone())?;
    let verifier = SignatureVerifier::new(Arc::from(
        config.slack_signing_secret.expose().as_bytes(),
    ));

    let receivers: Vec<String> = dispatcher.receivers().iter().map(ToString::to_string).collect();
    let state = router::AppState::new(
        metrics,
        verifier,
        Arc::new(slack),
        dispatcher,
        config.request_timeout,
    );

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        receivers = ?receivers,
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(stage = "app", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(stage = "app", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(stage = "app", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(stage = "app", "shutdown signal received, draining connections");
}
