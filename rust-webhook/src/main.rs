//! Sitegen webhook server.
//!
//! Receives signed site update notifications and triggers static site
//! rebuilds, one at a time per site.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sitegen::web::router;
use sitegen::{AppState, Config, DockerJobRunner, EnvFileDirectory, GenerationCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("webhook_server_starting");

    // Refuse to start without a signing secret
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        sites_dir = %config.sites_dir.display(),
        output_dir = %config.output_dir.display(),
        generator_container = %config.generator_container,
        post_build_configured = config.post_build_command.is_some(),
        signature_max_age = ?config.signature_max_age,
        "config_loaded"
    );

    let directory = Arc::new(EnvFileDirectory::new(config.sites_dir.clone()));
    let coordinator = GenerationCoordinator::new(Arc::new(DockerJobRunner::from_config(&config)));
    let state = AppState::new(config.clone(), directory, coordinator);

    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "webhook_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("webhook_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("webhook_server_shutting_down");
}
