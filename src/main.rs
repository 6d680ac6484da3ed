// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later
//! Blog API server

use blog_api::{integrations::Integrations, router, AppState, Config, Database};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting blog API server...");

    let config = Config::load()?;

    let db = Database::connect(&config.database).await?;
    info!(url = %config.database.url, "Connected to SurrealDB");

    let integrations = Integrations::from_config(&config.integrations);
    let state = Arc::new(AppState::new(config, db, integrations)?);

    // Stale rate-limit events are already ignored by the window count,
    // the sweep only keeps the table small.
    let limiter = state.limiter.clone();
    let interval = state.config.rate_limit.cleanup_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = limiter.cleanup().await {
                error!(error = %e, "Rate limit cleanup failed");
            }
        }
    });

    let addr = state.config.bind_addr.clone();
    let metrics_path = state
        .config
        .metrics
        .enabled
        .then(|| state.config.metrics.path.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Blog API listening on http://{}", addr);
    if let Some(path) = metrics_path {
        info!("Metrics: http://{}{}", addr, path);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
