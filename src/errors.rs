// ABOUTME: Unified error handling for the OAuth integration subsystem
// ABOUTME: Defines the AppError taxonomy, AppResult alias, and HTTP response mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy
///
/// Variants map one-to-one onto the failure modes of the token lifecycle:
/// configuration/routing errors are never retried, remote failures are
/// retried only by the next scheduled tick or the next on-demand call, and
/// `InvalidGrant` is terminal for a credential until the user re-authorizes.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested provider is not registered
    #[error("Provider '{0}' not found")]
    UnknownProvider(String),

    /// Remote provider call failed (non-success status or malformed payload)
    #[error("Provider request failed ({status:?}): {message}")]
    Provider {
        /// HTTP status reported by the remote service, when one was received
        status: Option<u16>,
        /// Descriptive failure message
        message: String,
    },

    /// Refresh token rejected by the remote service (terminal until re-auth)
    #[error("Refresh token rejected by provider: {0}")]
    InvalidGrant(String),

    /// Integration is missing or has no refresh token on file
    #[error("Integration or refresh token not found")]
    NotRefreshable,

    /// No integration record exists for this (user, provider) pair
    #[error("Integration for provider '{provider}' not found for user {user_id}")]
    IntegrationNotFound {
        /// User the lookup was scoped to
        user_id: uuid::Uuid,
        /// Provider name the lookup was scoped to
        provider: String,
    },

    /// On-demand refresh completed but the re-read came back absent
    #[error("Failed to refresh token for provider '{0}'")]
    RefreshFailed(String),

    /// Missing Authorization header or malformed Bearer scheme
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Bearer token present but invalid or expired
    #[error("Authentication failed: {0}")]
    AuthInvalid(String),

    /// Caller-supplied input failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (encryption, serialization, task plumbing)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a provider error from an optional remote status and message
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error signals a rejected refresh token
    ///
    /// The scheduler uses this to decide between deactivating a credential
    /// (`InvalidGrant`) and leaving it for retry on the next tick (anything
    /// else, including timeouts).
    #[must_use]
    pub const fn is_invalid_grant(&self) -> bool {
        matches!(self, Self::InvalidGrant(_))
    }

    /// HTTP status code this error maps to at the route boundary
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownProvider(_)
            | Self::InvalidGrant(_)
            | Self::NotRefreshable
            | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::IntegrationNotFound { .. } => StatusCode::NOT_FOUND,
            Self::AuthRequired(_) | Self::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
            Self::Provider { .. } | Self::RefreshFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidInput(format!("Invalid UUID: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
