// ABOUTME: Credential store operations for per-(user, provider) OAuth integrations
// ABOUTME: Point lookups, expiry-window queries, bulk inactive-record queries, and deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::Integration;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Integration data for the upsert operation
pub struct NewIntegration<'a> {
    /// Owning user
    pub user_id: Uuid,
    /// Provider name (registry key)
    pub provider: &'a str,
    /// Remote account identifier
    pub provider_user_id: &'a str,
    /// Fresh access token (plaintext; encrypted before storage)
    pub access_token: &'a str,
    /// Refresh token, when the provider issued one
    pub refresh_token: Option<&'a str>,
    /// Absolute access-token expiry
    pub expires_at: DateTime<Utc>,
    /// Opaque provider-specific metadata
    pub metadata: Option<&'a serde_json::Value>,
}

impl Database {
    /// Upsert an integration record
    ///
    /// Atomic per `(user_id, provider)`: a single `INSERT … ON CONFLICT`
    /// statement, so concurrent upserts for the same key cannot interleave
    /// into a mixed record. A re-authorization overwrites the existing row,
    /// keeps its surrogate id, and forces `is_active = TRUE`.
    ///
    /// Provider tokens are encrypted at rest using AES-256-GCM with AAD
    /// binding to prevent cross-user or cross-provider token reuse.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the database operation fails.
    pub async fn upsert_integration(&self, data: &NewIntegration<'_>) -> AppResult<Integration> {
        let aad_context = integration_aad(data.user_id, data.provider);

        let encrypted_access_token =
            self.encrypt_data_with_aad(data.access_token, &aad_context)?;
        let encrypted_refresh_token = data
            .refresh_token
            .map(|rt| self.encrypt_data_with_aad(rt, &aad_context))
            .transpose()?;

        let metadata_json = data
            .metadata
            .map(|m| serde_json::to_string(m))
            .transpose()
            .map_err(|e| AppError::internal(format!("Failed to serialize metadata: {e}")))?;

        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO integrations (
                id, user_id, provider, provider_user_id, access_token, refresh_token,
                expires_at, is_active, metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9, $10)
            ON CONFLICT (user_id, provider)
            DO UPDATE SET
                provider_user_id = EXCLUDED.provider_user_id,
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                is_active = TRUE,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(data.user_id.to_string())
        .bind(data.provider)
        .bind(data.provider_user_id)
        .bind(&encrypted_access_token)
        .bind(encrypted_refresh_token.as_deref())
        .bind(data.expires_at)
        .bind(metadata_json.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert integration: {e}")))?;

        self.get_integration(data.user_id, data.provider)
            .await?
            .ok_or_else(|| AppError::database("Upserted integration not found on re-read"))
    }

    /// Get an integration regardless of its active flag
    ///
    /// Used by the status endpoint, which reports inactive connections as
    /// not connected; lookup-for-use callers go through
    /// [`Database::get_active_integration`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn get_integration(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> AppResult<Option<Integration>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token,
                   expires_at, is_active, metadata, created_at, updated_at
            FROM integrations
            WHERE user_id = $1 AND provider = $2
            ",
        )
        .bind(user_id.to_string())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query integration: {e}")))?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(self.row_to_integration(&row)?)))
    }

    /// Get an active integration for use against the remote service
    ///
    /// Inactive records are never returned here.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn get_active_integration(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> AppResult<Option<Integration>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token,
                   expires_at, is_active, metadata, created_at, updated_at
            FROM integrations
            WHERE user_id = $1 AND provider = $2 AND is_active = TRUE
            ",
        )
        .bind(user_id.to_string())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query integration: {e}")))?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(self.row_to_integration(&row)?)))
    }

    /// Get an integration by surrogate id
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn get_integration_by_id(&self, id: &str) -> AppResult<Option<Integration>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token,
                   expires_at, is_active, metadata, created_at, updated_at
            FROM integrations
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query integration: {e}")))?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(self.row_to_integration(&row)?)))
    }

    /// List all integrations for a user, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn list_user_integrations(&self, user_id: Uuid) -> AppResult<Vec<Integration>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token,
                   expires_at, is_active, metadata, created_at, updated_at
            FROM integrations
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query user integrations: {e}")))?;

        let mut integrations = Vec::with_capacity(rows.len());
        for row in rows {
            integrations.push(self.row_to_integration(&row)?);
        }
        Ok(integrations)
    }

    /// Persist new token material after a successful refresh
    ///
    /// Leaves `is_active` untouched; deactivation is an independent
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing, encryption fails, or the
    /// database operation fails.
    pub async fn update_integration_tokens(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        // The AAD context depends on the row's key, so resolve it first
        let key: Option<(String, String)> =
            sqlx::query_as("SELECT user_id, provider FROM integrations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to query integration: {e}")))?;

        let Some((user_id_str, provider)) = key else {
            return Err(AppError::database(format!("Integration {id} not found")));
        };
        let user_id = Uuid::parse_str(&user_id_str)?;
        let aad_context = integration_aad(user_id, &provider);

        let encrypted_access_token = self.encrypt_data_with_aad(access_token, &aad_context)?;
        let encrypted_refresh_token = refresh_token
            .map(|rt| self.encrypt_data_with_aad(rt, &aad_context))
            .transpose()?;

        sqlx::query(
            r"
            UPDATE integrations
            SET access_token = $2,
                refresh_token = $3,
                expires_at = $4,
                updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&encrypted_access_token)
        .bind(encrypted_refresh_token.as_deref())
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update integration tokens: {e}")))?;

        Ok(())
    }

    /// Set the active flag on an integration
    ///
    /// Bumps `updated_at`, which the cleanup tick uses as the deactivation
    /// timestamp. Deactivation never deletes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_integration_active(&self, id: &str, active: bool) -> AppResult<()> {
        sqlx::query("UPDATE integrations SET is_active = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to set integration active: {e}")))?;

        Ok(())
    }

    /// Delete an integration by surrogate id
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete_integration(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM integrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete integration: {e}")))?;

        Ok(())
    }

    /// Find active, refreshable integrations expiring within `window`
    ///
    /// Only rows with `now ≤ expires_at ≤ now + window`, `is_active = TRUE`,
    /// and a refresh token on file qualify; already-expired and
    /// non-refreshable rows are never returned. Ordered by soonest expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn find_expiring_integrations(
        &self,
        window: Duration,
    ) -> AppResult<Vec<Integration>> {
        let now = Utc::now();
        let threshold = now + window;

        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token,
                   expires_at, is_active, metadata, created_at, updated_at
            FROM integrations
            WHERE is_active = TRUE
              AND refresh_token IS NOT NULL
              AND expires_at >= $1
              AND expires_at <= $2
            ORDER BY expires_at ASC
            ",
        )
        .bind(now)
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query expiring integrations: {e}")))?;

        let mut integrations = Vec::with_capacity(rows.len());
        for row in rows {
            integrations.push(self.row_to_integration(&row)?);
        }
        Ok(integrations)
    }

    /// List every active integration that has a refresh token on file
    ///
    /// Diagnostic companion to the expiry-window scan, ordered by soonest
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn find_active_refreshable_integrations(&self) -> AppResult<Vec<Integration>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, provider_user_id, access_token, refresh_token,
                   expires_at, is_active, metadata, created_at, updated_at
            FROM integrations
            WHERE is_active = TRUE AND refresh_token IS NOT NULL
            ORDER BY expires_at ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query active integrations: {e}")))?;

        let mut integrations = Vec::with_capacity(rows.len());
        for row in rows {
            integrations.push(self.row_to_integration(&row)?);
        }
        Ok(integrations)
    }

    /// Delete integrations that have been inactive since before `cutoff`
    ///
    /// Returns the number of rows removed. `updated_at` is bumped on
    /// deactivation, so it doubles as the deactivation timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete_inactive_integrations_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM integrations WHERE is_active = FALSE AND updated_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::database(format!("Failed to delete inactive integrations: {e}"))
                })?;

        Ok(result.rows_affected())
    }

    /// Convert a database row to an `Integration`, decrypting tokens
    fn row_to_integration(&self, row: &SqliteRow) -> AppResult<Integration> {
        let user_id_str: String = row.get("user_id");
        let user_id = Uuid::parse_str(&user_id_str)?;
        let provider: String = row.get("provider");

        let aad_context = integration_aad(user_id, &provider);

        let encrypted_access_token: String = row.get("access_token");
        let access_token = self.decrypt_data_with_aad(&encrypted_access_token, &aad_context)?;

        let encrypted_refresh_token: Option<String> = row.get("refresh_token");
        let refresh_token = encrypted_refresh_token
            .as_deref()
            .map(|ert| self.decrypt_data_with_aad(ert, &aad_context))
            .transpose()?;

        let metadata_json: Option<String> = row.get("metadata");
        let metadata = metadata_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AppError::internal(format!("Failed to parse metadata: {e}")))?;

        Ok(Integration {
            id: row.get("id"),
            user_id,
            provider,
            provider_user_id: row.get("provider_user_id"),
            access_token,
            refresh_token,
            expires_at: row.get("expires_at"),
            is_active: row.get("is_active"),
            metadata,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

/// AAD context binding a token ciphertext to its row key
fn integration_aad(user_id: Uuid, provider: &str) -> String {
    format!("{user_id}|{provider}|integrations")
}
