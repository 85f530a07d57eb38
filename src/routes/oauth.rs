// ABOUTME: OAuth connection endpoints: authorize, callback, and status
// ABOUTME: Thin handlers that authenticate the caller and delegate to the orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use super::AppContext;
use crate::errors::{AppError, AppResult};
use crate::models::IntegrationStatus;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

fn default_provider() -> String {
    crate::providers::conta_azul::PROVIDER_NAME.to_owned()
}

/// Query parameters for the authorize and status endpoints
#[derive(Debug, Deserialize)]
pub struct ProviderQuery {
    /// Provider to operate on; defaults to Conta Azul
    #[serde(default = "default_provider")]
    pub provider: String,
}

/// Query parameters for the OAuth callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Provider the authorization ran against; defaults to Conta Azul
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Authorization code returned by the provider
    pub code: Option<String>,
    /// Anti-forgery state echoed back by the provider
    pub state: Option<String>,
    /// Error code, when the user denied or the provider failed
    pub error: Option<String>,
}

/// `GET /integrations/oauth/authorize`
///
/// Builds the provider authorization URL with a freshly generated
/// anti-forgery state. The caller redirects the user's browser to the
/// returned URL and is responsible for round-tripping `state`.
///
/// # Errors
///
/// Returns `UnknownProvider` for unregistered providers.
pub async fn authorize(
    State(ctx): State<AppContext>,
    Query(query): Query<ProviderQuery>,
) -> AppResult<Json<Value>> {
    let state = Uuid::new_v4().to_string();
    let authorization_url = ctx.manager.authorization_url(&query.provider, &state)?;

    Ok(Json(json!({
        "authorization_url": authorization_url,
        "state": state,
        "message": format!("Visit this URL to authorize {}", query.provider),
    })))
}

/// `GET /integrations/oauth/callback`
///
/// Completes the authorization-code flow for the authenticated caller:
/// exchanges the code, identifies the remote account, and persists the
/// integration. Never echoes token material in the response.
///
/// # Errors
///
/// Returns `AuthRequired`/`AuthInvalid` for unauthenticated callers,
/// `InvalidInput` when the provider reported an error or omitted the code,
/// and a provider error if the exchange fails.
pub async fn callback(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Json<Value>> {
    let user_id = ctx.auth.authenticate(&headers)?;

    if let Some(error) = query.error {
        return Err(AppError::invalid_input(format!(
            "Authorization was not granted: {error}"
        )));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::invalid_input("Missing authorization code"))?;

    let token = ctx
        .manager
        .exchange_code_for_token(&query.provider, &code)
        .await?;
    let (integration, identity) = ctx
        .manager
        .save_integration(user_id, &query.provider, &token)
        .await?;

    info!(
        user_id = %user_id,
        provider = %query.provider,
        "OAuth callback completed"
    );

    Ok(Json(json!({
        "success": true,
        "message": format!("{} connected successfully", query.provider),
        "integration_id": integration.id,
        "provider": integration.provider,
        "provider_user_id": integration.provider_user_id,
        "account_name": identity.name,
        "expires_at": integration.expires_at,
    })))
}

/// `GET /integrations/oauth/status`
///
/// Connection summary for the authenticated caller. Reports inactive
/// integrations as not connected and never reveals token material.
///
/// # Errors
///
/// Returns `AuthRequired`/`AuthInvalid` for unauthenticated callers and
/// `UnknownProvider` for unregistered providers.
pub async fn status(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<ProviderQuery>,
) -> AppResult<Json<IntegrationStatus>> {
    let user_id = ctx.auth.authenticate(&headers)?;
    let status = ctx.manager.integration_status(user_id, &query.provider).await?;
    Ok(Json(status))
}
