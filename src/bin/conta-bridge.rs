// ABOUTME: Service entry point: config load, wiring, scheduler start, HTTP serve
// ABOUTME: Composes the credential store, provider registry, orchestrator, and router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use anyhow::{Context, Result};
use conta_bridge::auth::AuthManager;
use conta_bridge::config::ServerConfig;
use conta_bridge::database::Database;
use conta_bridge::logging::init_logging;
use conta_bridge::oauth::OAuthManager;
use conta_bridge::providers::{ContaAzulProvider, ProviderRegistry};
use conta_bridge::routes::{router, AppContext};
use conta_bridge::scheduler::TokenRefreshScheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    let database = Arc::new(
        Database::new(&config.database_url, config.encryption_key.clone())
            .await
            .context("Failed to initialize database")?,
    );

    let conta_azul = ContaAzulProvider::new(config.conta_azul.clone(), config.provider_timeout)
        .context("Failed to initialize Conta Azul provider")?;
    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(Arc::new(conta_azul))
            .build(),
    );
    info!(providers = ?registry.supported_providers(), "Provider registry initialized");

    let manager = Arc::new(OAuthManager::new(database, registry));

    let scheduler = Arc::new(TokenRefreshScheduler::new(
        Arc::clone(&manager),
        config.scheduler.clone(),
    ));
    let (_renewal_task, _cleanup_task) = scheduler.spawn();

    let ctx = AppContext {
        manager,
        auth: Arc::new(AuthManager::new(&config.jwt_secret)),
    };
    let app = router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
