// ABOUTME: OAuth provider abstraction and immutable provider registry
// ABOUTME: Defines the capability set every external-service adapter implements
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

//! # OAuth Provider System
//!
//! Every external service the backend integrates with implements the
//! [`OAuthProvider`] capability set: authorization-URL generation,
//! authorization-code exchange, refresh, and remote identity lookup. All
//! four operations are pure network calls with no local state mutation.
//!
//! Adapters are collected into a [`ProviderRegistry`] once at process start;
//! the registry is immutable afterwards and handed to the orchestrator as an
//! explicit dependency.

/// Conta Azul adapter
pub mod conta_azul;

pub use conta_azul::{ContaAzulEndpoints, ContaAzulProvider};

use crate::errors::{AppError, AppResult};
use crate::models::{RemoteIdentity, TokenResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Capability set implemented by every OAuth provider adapter
///
/// Contract: operations fail with `AppError::Provider` when the remote call
/// returns a non-success status or a malformed payload, and with
/// `AppError::InvalidGrant` when the remote rejects a refresh token.
/// `refresh_access_token` must tolerate the remote omitting a new refresh
/// token by reusing the supplied one.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name used as the registry key and credential scope
    fn name(&self) -> &str;

    /// Build the authorization URL, embedding the caller-supplied
    /// anti-forgery `state` verbatim
    ///
    /// The caller is responsible for round-tripping and validating `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for token material
    async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse>;

    /// Renew an access token using a refresh token
    async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<TokenResponse>;

    /// Fetch the remote account identity for a fresh access token
    async fn fetch_identity(&self, access_token: &str) -> AppResult<RemoteIdentity>;
}

/// Immutable name→adapter mapping, populated once at initialization
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder {
            providers: HashMap::new(),
        }
    }

    /// Look up an adapter by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if no adapter is registered under `name`.
    pub fn get(&self, name: &str) -> AppResult<Arc<dyn OAuthProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownProvider(name.to_owned()))
    }

    /// Names of all registered providers
    #[must_use]
    pub fn supported_providers(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Builder consumed at startup; the finished registry never mutates
pub struct ProviderRegistryBuilder {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistryBuilder {
    /// Register an adapter under its own name
    #[must_use]
    pub fn register(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.providers.insert(provider.name().to_owned(), provider);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}
