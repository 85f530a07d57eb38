// ABOUTME: On-demand token validation with lazy refresh
// ABOUTME: Hands callers a usable access token, renewing expired ones transparently
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use crate::errors::{AppError, AppResult};
use crate::models::{Integration, TokenExpiryInfo};
use crate::oauth::OAuthManager;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Validates stored credentials at the moment of use
///
/// The scheduler renews tokens ahead of expiry, but a credential can still
/// be expired when a caller needs it (process downtime, clock drift, a
/// missed tick). This is the read path's safety net: it refreshes lazily
/// and only ever hands out a token it believes to be live.
pub struct TokenValidator {
    manager: Arc<OAuthManager>,
}

impl TokenValidator {
    /// Create a validator over the shared orchestrator
    #[must_use]
    pub const fn new(manager: Arc<OAuthManager>) -> Self {
        Self { manager }
    }

    /// Get a usable access token for a user's integration
    ///
    /// Returns the stored token when it has not expired; otherwise refreshes
    /// through the orchestrator (serialized with any concurrent refresh of
    /// the same credential) and returns the renewed token.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationNotFound` when no active integration exists,
    /// `NotRefreshable` when the expired credential has no refresh token,
    /// and `InvalidGrant` or a provider error when renewal fails.
    pub async fn get_valid_token(&self, user_id: Uuid, provider: &str) -> AppResult<String> {
        let integration = self
            .manager
            .get_active_integration(user_id, provider)
            .await?
            .ok_or_else(|| AppError::IntegrationNotFound {
                user_id,
                provider: provider.to_owned(),
            })?;

        if is_live(&integration) {
            return Ok(integration.access_token);
        }

        debug!(
            user_id = %user_id,
            provider = %provider,
            expires_at = %integration.expires_at,
            "Stored token expired; refreshing on demand"
        );

        let renewed = self
            .manager
            .refresh_integration_token(&integration.id)
            .await?;
        Ok(renewed.access_token)
    }

    /// Whether a usable credential exists, without refreshing
    ///
    /// Pure read: true iff an active integration exists and its token has
    /// not expired. Never triggers a refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn is_token_valid(&self, user_id: Uuid, provider: &str) -> AppResult<bool> {
        let integration = self.manager.get_active_integration(user_id, provider).await?;
        Ok(integration.as_ref().is_some_and(is_live))
    }

    /// Expiry summary for a user's integration
    ///
    /// Returns `None` when no active integration exists; "not connected"
    /// is a valid answer here, not a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn token_expiry_info(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> AppResult<Option<TokenExpiryInfo>> {
        let Some(integration) = self
            .manager
            .get_active_integration(user_id, provider)
            .await?
        else {
            return Ok(None);
        };

        let now = Utc::now();
        let millis_remaining = (integration.expires_at - now).num_milliseconds().max(0);

        Ok(Some(TokenExpiryInfo {
            is_expired: now > integration.expires_at,
            millis_remaining,
            expires_at: integration.expires_at,
        }))
    }
}

/// A token is valid up to and including its expiry instant
fn is_live(integration: &Integration) -> bool {
    integration.is_active && Utc::now() <= integration.expires_at
}
