//! Wallet webhook host - reference server for the webhook engine.
//!
//! This binary:
//! - Mounts the event ingress on an axum server
//! - Registers logging handlers for the wallet's notification types
//! - Subscribes with the wallet service on startup and unsubscribes on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use serde::Deserialize;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wallet_webhook::web::health;
use wallet_webhook::{register_handler, Config, HttpSubscriptionClient, Webhook};

/// Incoming transaction notification.
#[derive(Debug, Deserialize)]
struct TransactionEvent {
    id: String,
    #[serde(default)]
    status: String,
}

/// Keep-alive probe sent by the wallet service.
#[derive(Debug, Deserialize)]
struct Ping {
    #[serde(default)]
    seq: u64,
}

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

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        path = %config.webhook_path,
        webhook_url = %config.webhook_url,
        token_configured = !config.token_header.is_empty(),
        buffer_size = config.buffer_size,
        processors = config.processors,
        "config_loaded"
    );

    let root = CancellationToken::new();

    let mut client = HttpSubscriptionClient::new(&config.wallet_admin_url)
        .context("Invalid wallet admin URL")?;
    if let Some(token) = &config.wallet_admin_token {
        client = client.with_admin_token(token.clone());
    }

    let webhook = Webhook::with_client(
        &config.webhook_url,
        config.options(root.clone()),
        Arc::new(client),
    )
    .context("Failed to create webhook")?;

    register_handler(&webhook, |tx: &TransactionEvent| {
        info!(id = %tx.id, status = %tx.status, "transaction_event");
    });
    register_handler(&webhook, |ping: &Ping| {
        info!(seq = ping.seq, "ping_event");
    });

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .merge(webhook.router(&config.webhook_path))
        .layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "webhook_server_listening");

    webhook
        .subscribe()
        .await
        .context("Failed to subscribe with the wallet service")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = webhook.unsubscribe().await {
        warn!(error = %e, "webhook_unsubscribe_failed");
    }

    webhook.shutdown().await;

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
