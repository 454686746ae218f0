// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zeekr-Bridge API Server
//!
//! Keeps a Zeekr vehicle's token pair alive, polls its telematics API on a
//! fixed interval and exposes the snapshot and remote commands over HTTP.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeekr_bridge::{
    config::Config,
    services::{VehicleHandle, VehicleRegistry},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        vin = %config.vin,
        signing = config.app_secret.is_some(),
        "Starting Zeekr-Bridge"
    );

    let handle = VehicleHandle::from_config(&config)?;

    // A failed login is not fatal: the status route reports it, and each
    // scheduled cycle retries a login that failed transiently.
    if let Err(e) = handle.auth.login().await {
        tracing::error!(vin = %config.vin, error = %e, "Initial login failed");
    }

    let registry = VehicleRegistry::new();
    let handle = registry.insert(handle);

    let scheduler = tokio::spawn(handle.coordinator.clone().run());
    tracing::info!(
        interval_secs = config.poll_interval.as_secs(),
        "Snapshot scheduler started"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
    });

    // Build router
    let app = zeekr_bridge::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zeekr_bridge=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
