// ABOUTME: HTTP surface of the integration service
// ABOUTME: Assembles the axum router and shared request context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

/// OAuth connection endpoints
pub mod oauth;

use crate::auth::AuthManager;
use crate::oauth::OAuthManager;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppContext {
    /// Integration orchestrator
    pub manager: Arc<OAuthManager>,
    /// Caller authentication
    pub auth: Arc<AuthManager>,
}

/// Build the application router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/integrations/oauth/authorize", get(oauth::authorize))
        .route("/integrations/oauth/callback", get(oauth::callback))
        .route("/integrations/oauth/status", get(oauth::status))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
