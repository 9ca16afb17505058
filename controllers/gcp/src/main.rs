//! GCP Controller
//!
//! Reconciles GCP managed resources declared as Kubernetes custom resources:
//! - ManagedZone: Cloud DNS managed zones
//! - ResourceRecordSet: Cloud DNS record sets
//! - CloudSqlInstance: Cloud SQL instances
//!
//! Credentials come from the cluster-scoped ProviderConfig each resource
//! references.

mod config;
mod connector;
mod controller;
mod database;
mod dns;
mod error;
mod server;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::server::{start_server, ServerState};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcp_controller=info,managed=info".into()),
        )
        .init();

    info!("Starting GCP Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Poll interval: {:?}", config.poll_interval);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!("  Concurrency per kind: {}", config.max_concurrent_reconciliations);

    managed::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let port = config.metrics_port;
    let state = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!("HTTP server error: {}", e);
        }
    });

    let controller = Controller::new(&config).await?;
    server_state.set_ready(true);
    controller.run().await?;

    info!("GCP Controller stopped");
    Ok(())
}
