// ABOUTME: Common data models for OAuth credential state and provider responses
// ABOUTME: Defines the Integration record, token responses, and remote identity types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted OAuth credential state for one (user, provider) pair
///
/// Exactly one row exists per `(user_id, provider)`; the surrogate `id` stays
/// stable across re-authorizations. Tokens are stored encrypted at rest and
/// arrive decrypted on this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    /// Surrogate identifier (UUID string)
    pub id: String,
    /// Owning user
    pub user_id: Uuid,
    /// Provider name (e.g. "conta-azul")
    pub provider: String,
    /// Remote account identifier reported by the provider
    pub provider_user_id: String,
    /// Current access token (opaque secret)
    pub access_token: String,
    /// Refresh token, when the provider issued one
    ///
    /// `None` means the credential can only be renewed by a fresh
    /// authorization-code flow, never automatically.
    pub refresh_token: Option<String>,
    /// Absolute access-token expiry (issuance time + provider lifetime)
    pub expires_at: DateTime<Utc>,
    /// Whether the credential is usable; inactive records are never returned
    /// by lookup-for-use operations
    pub is_active: bool,
    /// Opaque provider-specific metadata bag
    pub metadata: Option<serde_json::Value>,
    /// Record creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time (refresh, deactivation, re-authorization)
    pub updated_at: DateTime<Utc>,
}

/// Token material returned by a provider's token endpoint
#[derive(Debug, Clone)]
pub struct TokenResponse {
    /// Fresh access token
    pub access_token: String,
    /// Rotated refresh token; providers may omit this on refresh, in which
    /// case the adapter reuses the token it was called with
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds, as reported by the provider
    pub expires_in_secs: i64,
    /// Token type, usually "Bearer"
    pub token_type: String,
}

/// Remote account identity from a provider's "who am I" endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RemoteIdentity {
    /// Remote account identifier (provider-specific precedence rules apply)
    pub id: String,
    /// Account email, when exposed
    pub email: Option<String>,
    /// Display name, when exposed
    pub name: Option<String>,
}

/// Expiry summary for a stored credential
#[derive(Debug, Clone, Serialize)]
pub struct TokenExpiryInfo {
    /// Whether the access token is already past its expiry
    pub is_expired: bool,
    /// Milliseconds until expiry, clamped to zero once expired
    pub millis_remaining: i64,
    /// Absolute expiry timestamp
    pub expires_at: DateTime<Utc>,
}

/// Connection summary returned by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStatus {
    /// Whether an active integration exists for the provider
    pub connected: bool,
    /// Provider the status refers to
    pub provider: String,
    /// Remote account identifier, when connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_user_id: Option<String>,
    /// When the integration was first created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    /// When the integration was last mutated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}
