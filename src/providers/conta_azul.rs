// ABOUTME: Conta Azul OAuth2 provider adapter
// ABOUTME: Implements authorization, token exchange, refresh, and identity lookup against the Conta Azul API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use super::OAuthProvider;
use crate::config::OAuthProviderConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{RemoteIdentity, TokenResponse};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Registry key and credential scope for this adapter
pub const PROVIDER_NAME: &str = "conta-azul";

/// Access-token lifetime assumed when the remote omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
/// OAuth scope requested during authorization
const AUTHORIZE_SCOPE: &str = "openid profile aws.cognito.signin.user.admin";

/// Conta Azul endpoint set; overridable for sandbox and test environments
#[derive(Debug, Clone)]
pub struct ContaAzulEndpoints {
    /// Browser-facing authorization page
    pub auth_url: String,
    /// OAuth2 token endpoint (exchange and refresh)
    pub token_url: String,
    /// "Who am I" endpoint used to identify the remote account
    pub user_url: String,
}

impl Default for ContaAzulEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://auth.contaazul.com/login".into(),
            token_url: "https://auth.contaazul.com/oauth2/token".into(),
            user_url: "https://api-v2.contaazul.com/v1/pessoas".into(),
        }
    }
}

/// Token payload as the Conta Azul token endpoint returns it
#[derive(Debug, Deserialize)]
struct ContaAzulTokenPayload {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

/// OAuth adapter for the Conta Azul business-management API
pub struct ContaAzulProvider {
    config: OAuthProviderConfig,
    endpoints: ContaAzulEndpoints,
    client: reqwest::Client,
}

impl ContaAzulProvider {
    /// Create an adapter against the production Conta Azul endpoints
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: OAuthProviderConfig, timeout: Duration) -> AppResult<Self> {
        Self::with_endpoints(config, timeout, ContaAzulEndpoints::default())
    }

    /// Create an adapter against custom endpoints (sandbox, tests)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_endpoints(
        config: OAuthProviderConfig,
        timeout: Duration,
        endpoints: ContaAzulEndpoints,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            endpoints,
            client,
        })
    }

    /// POST to the token endpoint with HTTP Basic client authentication
    async fn token_request(&self, params: &[(&str, &str)]) -> AppResult<ContaAzulTokenPayload> {
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status.as_u16(), &body));
        }

        response.json::<ContaAzulTokenPayload>().await.map_err(|e| {
            AppError::provider(
                Some(status.as_u16()),
                format!("Malformed token payload: {e}"),
            )
        })
    }
}

#[async_trait]
impl OAuthProvider for ContaAzulProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(AUTHORIZE_SCOPE),
        )
    }

    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        let payload = self
            .token_request(&[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;

        Ok(token_response_from(payload, None))
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let payload = self
            .token_request(&[
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        // Conta Azul may omit the refresh token on renewal; keep the one we
        // were called with so the credential stays auto-renewable.
        Ok(token_response_from(payload, Some(refresh_token)))
    }

    async fn fetch_identity(&self, access_token: &str) -> AppResult<RemoteIdentity> {
        let response = self
            .client
            .get(&self.endpoints.user_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider(
                Some(status.as_u16()),
                format!("Identity lookup failed: {status}"),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::provider(
                Some(status.as_u16()),
                format!("Malformed identity payload: {e}"),
            )
        })?;

        Ok(identity_from_payload(&body))
    }
}

/// Convert the wire payload into the generic token response
fn token_response_from(
    payload: ContaAzulTokenPayload,
    fallback_refresh_token: Option<&str>,
) -> TokenResponse {
    TokenResponse {
        access_token: payload.access_token,
        refresh_token: payload
            .refresh_token
            .or_else(|| fallback_refresh_token.map(str::to_owned)),
        expires_in_secs: payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        token_type: payload.token_type.unwrap_or_else(|| "Bearer".to_owned()),
    }
}

/// Map a reqwest transport failure (timeout, DNS, connection reset)
fn transport_error(err: reqwest::Error) -> AppError {
    let status = err.status().map(|s| s.as_u16());
    if err.is_timeout() {
        AppError::provider(status, "Request to Conta Azul timed out")
    } else {
        AppError::provider(status, format!("Request to Conta Azul failed: {err}"))
    }
}

/// Classify a non-success token-endpoint response
///
/// An `invalid_grant` body means the refresh token (or code) was rejected
/// outright; everything else is a transient provider failure.
fn classify_token_error(status: u16, body: &str) -> AppError {
    if body.contains("invalid_grant") {
        AppError::InvalidGrant(truncate(body, 200).to_owned())
    } else {
        AppError::provider(Some(status), format!("Token request failed: {}", truncate(body, 200)))
    }
}

/// Map a Conta Azul identity payload to a `RemoteIdentity`
///
/// The payload arrives either enveloped (`{"data": …}`) or flat, and the
/// envelope may hold a list, in which case the first entry counts. The
/// remote id resolves with precedence `id` (number or string) → `cpf` →
/// `"unknown"`; the display name with precedence `nome` → `name`.
fn identity_from_payload(body: &Value) -> RemoteIdentity {
    let data = match body.get("data") {
        Some(Value::Array(items)) => items.first().unwrap_or(body),
        Some(enveloped @ Value::Object(_)) => enveloped,
        _ => body,
    };

    let id = data
        .get("id")
        .map(scalar_to_string)
        .or_else(|| data.get("cpf").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| "unknown".to_owned());

    let email = data.get("email").and_then(Value::as_str).map(str::to_owned);

    let name = data
        .get("nome")
        .or_else(|| data.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    RemoteIdentity { id, email, name }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
