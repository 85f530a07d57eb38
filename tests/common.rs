// ABOUTME: Shared test fixtures: in-memory database, mock provider, manager wiring
// ABOUTME: Used by the database, orchestrator, validator, scheduler, and route tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conta_bridge::database::{Database, NewIntegration};
use conta_bridge::errors::{AppError, AppResult};
use conta_bridge::models::{Integration, RemoteIdentity, TokenResponse};
use conta_bridge::oauth::OAuthManager;
use conta_bridge::providers::{OAuthProvider, ProviderRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const MOCK_PROVIDER: &str = "mock";

/// How the mock provider answers refresh requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Succeed,
    InvalidGrant,
    Transient,
}

/// Scriptable provider adapter with call counters
pub struct MockProvider {
    mode: Mutex<RefreshMode>,
    refresh_delay: Duration,
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub identity_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(RefreshMode::Succeed),
            refresh_delay: Duration::ZERO,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            identity_calls: AtomicUsize::new(0),
        }
    }

    /// Hold each refresh open for `delay`, so concurrent callers overlap
    pub fn with_refresh_delay(delay: Duration) -> Self {
        Self {
            refresh_delay: delay,
            ..Self::new()
        }
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn refresh_call_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OAuthProvider for MockProvider {
    fn name(&self) -> &str {
        MOCK_PROVIDER
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://mock.example.com/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TokenResponse {
            access_token: format!("at-{code}"),
            refresh_token: Some("rt-initial".to_owned()),
            expires_in_secs: 3600,
            token_type: "Bearer".to_owned(),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        // Per-credential override, regardless of the global mode
        if refresh_token == "rt-fail-transient" {
            return Err(AppError::provider(Some(503), "temporarily unavailable"));
        }
        match *self.mode.lock().unwrap() {
            RefreshMode::Succeed => Ok(TokenResponse {
                access_token: format!("at-refreshed-{n}"),
                refresh_token: Some(format!("rt-rotated-{n}")),
                expires_in_secs: 3600,
                token_type: "Bearer".to_owned(),
            }),
            RefreshMode::InvalidGrant => {
                Err(AppError::InvalidGrant("invalid_grant: token revoked".to_owned()))
            }
            RefreshMode::Transient => {
                Err(AppError::provider(Some(503), "temporarily unavailable"))
            }
        }
    }

    async fn fetch_identity(&self, _access_token: &str) -> AppResult<RemoteIdentity> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteIdentity {
            id: "remote-user-1".to_owned(),
            email: Some("user@example.com".to_owned()),
            name: Some("Test User".to_owned()),
        })
    }
}

/// Fresh in-memory database with a fixed test key
pub async fn test_database() -> Arc<Database> {
    Arc::new(
        Database::new("sqlite::memory:", vec![1u8; 32])
            .await
            .expect("in-memory database"),
    )
}

/// Manager wired to a fresh database and the given mock provider
pub async fn test_manager(provider: Arc<MockProvider>) -> (Arc<OAuthManager>, Arc<Database>) {
    let database = test_database().await;
    let registry = Arc::new(ProviderRegistry::builder().register(provider).build());
    let manager = Arc::new(OAuthManager::new(Arc::clone(&database), registry));
    (manager, database)
}

/// Insert an active integration expiring at `expires_at`
pub async fn insert_integration(
    database: &Database,
    user_id: Uuid,
    provider: &str,
    expires_at: DateTime<Utc>,
    refresh_token: Option<&str>,
) -> Integration {
    database
        .upsert_integration(&NewIntegration {
            user_id,
            provider,
            provider_user_id: "remote-user-1",
            access_token: "at-stored",
            refresh_token,
            expires_at,
            metadata: None,
        })
        .await
        .expect("insert integration")
}
