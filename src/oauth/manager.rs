// ABOUTME: Integration orchestrator composing provider adapters with the credential store
// ABOUTME: Owns authorization, code exchange, persistence, and single-flight token refresh
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use crate::database::{Database, NewIntegration};
use crate::errors::{AppError, AppResult};
use crate::models::{Integration, IntegrationStatus, RemoteIdentity, TokenResponse};
use crate::providers::ProviderRegistry;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Orchestrates the OAuth credential lifecycle across all providers
///
/// Holds a per-`(user, provider)` lock map so that refreshes of the same
/// credential are serialized; providers that rotate refresh tokens on every
/// renewal would otherwise lose the credential to a duplicate in-flight
/// refresh.
pub struct OAuthManager {
    database: Arc<Database>,
    registry: Arc<ProviderRegistry>,
    refresh_locks: DashMap<(Uuid, String), Arc<Mutex<()>>>,
}

impl OAuthManager {
    /// Create an orchestrator over a credential store and provider registry
    #[must_use]
    pub fn new(database: Arc<Database>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            database,
            registry,
            refresh_locks: DashMap::new(),
        }
    }

    /// Credential store handle
    #[must_use]
    pub const fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Provider registry handle
    #[must_use]
    pub const fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Build the authorization URL for a provider, embedding `state` verbatim
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if the provider is not registered.
    pub fn authorization_url(&self, provider: &str, state: &str) -> AppResult<String> {
        let adapter = self.registry.get(provider)?;
        Ok(adapter.authorization_url(state))
    }

    /// Exchange an authorization code for token material
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` for unregistered providers and a provider
    /// error if the remote exchange fails.
    pub async fn exchange_code_for_token(
        &self,
        provider: &str,
        code: &str,
    ) -> AppResult<TokenResponse> {
        let adapter = self.registry.get(provider)?;
        adapter.exchange_code(code).await
    }

    /// Persist token material for a user, identifying the remote account
    ///
    /// Fetches the remote identity with the fresh access token, then upserts
    /// the credential. A re-authorization overwrites the existing record and
    /// reactivates it. Returns the stored record and the identity it was
    /// linked to.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity lookup, encryption, or the database
    /// write fails.
    pub async fn save_integration(
        &self,
        user_id: Uuid,
        provider: &str,
        token: &TokenResponse,
    ) -> AppResult<(Integration, RemoteIdentity)> {
        let adapter = self.registry.get(provider)?;
        let identity = adapter.fetch_identity(&token.access_token).await?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in_secs);
        let metadata = serde_json::json!({
            "email": identity.email,
            "name": identity.name,
        });

        let integration = self
            .database
            .upsert_integration(&NewIntegration {
                user_id,
                provider,
                provider_user_id: &identity.id,
                access_token: &token.access_token,
                refresh_token: token.refresh_token.as_deref(),
                expires_at,
                metadata: Some(&metadata),
            })
            .await?;

        info!(
            user_id = %user_id,
            provider = %provider,
            provider_user_id = %identity.id,
            "Integration connected"
        );

        Ok((integration, identity))
    }

    /// Refresh the access token of a stored integration
    ///
    /// Single-flight per `(user, provider)`: concurrent calls for the same
    /// credential queue on a lock, and a caller that finds the expiry
    /// already advanced while it waited returns the fresh record without a
    /// second remote call.
    ///
    /// Never touches `is_active`; the caller decides whether a rejected
    /// refresh token warrants deactivation.
    ///
    /// # Errors
    ///
    /// Returns `NotRefreshable` if the record is missing or carries no
    /// refresh token, `InvalidGrant` if the remote rejects the refresh
    /// token, and a provider or database error otherwise.
    pub async fn refresh_integration_token(&self, integration_id: &str) -> AppResult<Integration> {
        let integration = self
            .database
            .get_integration_by_id(integration_id)
            .await?
            .ok_or(AppError::NotRefreshable)?;

        let key = (integration.user_id, integration.provider.clone());
        let lock = self
            .refresh_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.refresh_under_lock(integration_id, integration.expires_at)
                .await
        };

        // Drop the map entry once no other caller holds it, so deleted or
        // one-off credentials do not pin a lock forever.
        drop(lock);
        self.refresh_locks
            .remove_if(&key, |_, entry| Arc::strong_count(entry) == 1);

        result
    }

    /// Number of per-credential refresh locks currently held
    ///
    /// Diagnostic: non-zero only while refreshes are in flight.
    #[must_use]
    pub fn in_flight_refresh_locks(&self) -> usize {
        self.refresh_locks.len()
    }

    /// Refresh body; the caller holds the per-credential lock
    async fn refresh_under_lock(
        &self,
        integration_id: &str,
        expiry_snapshot: chrono::DateTime<Utc>,
    ) -> AppResult<Integration> {
        // Re-read under the lock: a concurrent refresh may already have
        // landed while this caller queued.
        let current = self
            .database
            .get_integration_by_id(integration_id)
            .await?
            .ok_or(AppError::NotRefreshable)?;

        if current.expires_at != expiry_snapshot {
            debug!(
                integration_id = %integration_id,
                provider = %current.provider,
                "Skipping refresh; credential already renewed by a concurrent caller"
            );
            return Ok(current);
        }

        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(AppError::NotRefreshable)?;

        let adapter = self.registry.get(&current.provider)?;
        let token = adapter.refresh_access_token(refresh_token).await?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in_secs);
        self.database
            .update_integration_tokens(
                integration_id,
                &token.access_token,
                token.refresh_token.as_deref(),
                expires_at,
            )
            .await?;

        info!(
            integration_id = %integration_id,
            user_id = %current.user_id,
            provider = %current.provider,
            expires_at = %expires_at,
            "Access token refreshed"
        );

        self.database
            .get_integration_by_id(integration_id)
            .await?
            .ok_or_else(|| AppError::RefreshFailed(current.provider.clone()))
    }

    /// Look up an active integration for use against the remote service
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn get_active_integration(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> AppResult<Option<Integration>> {
        self.database.get_active_integration(user_id, provider).await
    }

    /// Connection summary for the status endpoint
    ///
    /// Inactive records report as not connected; connection details are only
    /// exposed for active records. Never reveals token material.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` for unregistered providers and a database
    /// error if the lookup fails.
    pub async fn integration_status(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> AppResult<IntegrationStatus> {
        // Validate the provider name even when no record exists
        self.registry.get(provider)?;

        let record = self.database.get_integration(user_id, provider).await?;
        let status = match record {
            Some(integration) if integration.is_active => IntegrationStatus {
                connected: true,
                provider: provider.to_owned(),
                provider_user_id: Some(integration.provider_user_id),
                connected_at: Some(integration.created_at),
                last_updated: Some(integration.updated_at),
            },
            Some(_) => {
                warn!(
                    user_id = %user_id,
                    provider = %provider,
                    "Status requested for deactivated integration"
                );
                IntegrationStatus {
                    connected: false,
                    provider: provider.to_owned(),
                    provider_user_id: None,
                    connected_at: None,
                    last_updated: None,
                }
            }
            None => IntegrationStatus {
                connected: false,
                provider: provider.to_owned(),
                provider_user_id: None,
                connected_at: None,
                last_updated: None,
            },
        };

        Ok(status)
    }

    /// Deactivate an integration, keeping the record for diagnostics
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn deactivate_integration(&self, integration_id: &str) -> AppResult<()> {
        self.database
            .set_integration_active(integration_id, false)
            .await
    }
}
