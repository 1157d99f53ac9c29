//! nr-alerts-operator - admission webhooks for NRQL alert condition resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Wires the webhook dependencies (secret store, alerts client factory)
//! - Starts the health server and the TLS webhook server

use std::path::Path;
use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use nr_alerts_operator::alerts::HttpAlertsClientFactory;
use nr_alerts_operator::health::{HealthState, run_health_server};
use nr_alerts_operator::webhooks::{KubeSecretStore, WebhookDeps};
use nr_alerts_operator::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nr_alerts_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting nr-alerts-operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Webhook collaborators, constructed once and shared immutably across
    // concurrent admission calls.
    let deps = WebhookDeps::new(
        Arc::new(KubeSecretStore::new(client.clone())),
        Arc::new(HttpAlertsClientFactory::default()),
    );

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (probes should work before the
    // webhook server is up)
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // The webhooks are registered fail-closed; without TLS certificates the
    // operator cannot answer admission requests at all.
    if !Path::new(WEBHOOK_CERT_PATH).exists() || !Path::new(WEBHOOK_KEY_PATH).exists() {
        error!(
            cert = WEBHOOK_CERT_PATH,
            key = WEBHOOK_KEY_PATH,
            "Webhook TLS certificates not found"
        );
        return Err("webhook TLS certificates not found".into());
    }

    info!("TLS certificates found, starting webhook server");
    let webhook_handle = {
        let deps = deps.clone();
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(
                deps,
                Some(health_state),
                WEBHOOK_CERT_PATH,
                WEBHOOK_KEY_PATH,
            )
            .await
            {
                error!("Webhook server error: {}", e);
            }
        })
    };

    health_state.set_ready(true).await;

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down");
            health_state.set_ready(false).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the operator cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
