// ABOUTME: Environment-based configuration management for the integration service
// ABOUTME: Loads and validates provider credentials, scheduler intervals, and server settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Duration as ChronoDuration;
use std::env;
use std::time::Duration;

/// Default proactive-renewal poll interval
const DEFAULT_REFRESH_POLL_SECS: u64 = 60;
/// Default look-ahead window for expiring credentials
const DEFAULT_EXPIRY_LOOKAHEAD_SECS: i64 = 300;
/// Default cleanup interval (6 hours)
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 6 * 60 * 60;
/// Default retention for inactive integrations before deletion
const DEFAULT_INACTIVE_RETENTION_DAYS: i64 = 30;
/// Default timeout applied to every remote provider call
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// OAuth client credentials for one provider
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    /// OAuth client id issued by the provider
    pub client_id: String,
    /// OAuth client secret issued by the provider
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

/// Scheduler intervals and windows for the token-lifecycle jobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the proactive-renewal tick runs
    pub refresh_poll_interval: Duration,
    /// Look-ahead window: credentials expiring within this window are renewed
    pub expiry_lookahead: ChronoDuration,
    /// How often the cleanup tick runs
    pub cleanup_interval: Duration,
    /// How long an integration must be inactive before cleanup deletes it
    pub inactive_retention: ChronoDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_poll_interval: Duration::from_secs(DEFAULT_REFRESH_POLL_SECS),
            expiry_lookahead: ChronoDuration::seconds(DEFAULT_EXPIRY_LOOKAHEAD_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            inactive_retention: ChronoDuration::days(DEFAULT_INACTIVE_RETENTION_DAYS),
        }
    }
}

/// Complete server configuration, loaded from the environment at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database connection string (SQLite URL)
    pub database_url: String,
    /// 32-byte AES-256-GCM key for token encryption at rest
    pub encryption_key: Vec<u8>,
    /// HS256 secret for validating caller Bearer tokens
    pub jwt_secret: String,
    /// Conta Azul OAuth client credentials
    pub conta_azul: OAuthProviderConfig,
    /// Token-lifecycle scheduler settings
    pub scheduler: SchedulerConfig,
    /// Timeout for remote provider calls
    pub provider_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a numeric value
    /// fails to parse, or the encryption key is not 32 base64-encoded bytes.
    pub fn from_env() -> AppResult<Self> {
        let http_port = env_or("HTTP_PORT", "8081")
            .parse::<u16>()
            .map_err(|e| AppError::config(format!("Invalid HTTP_PORT: {e}")))?;

        let database_url = env_or("DATABASE_URL", "sqlite:data/conta_bridge.db");

        let encryption_key = Self::decode_encryption_key(&required_env("ENCRYPTION_KEY")?)?;
        let jwt_secret = required_env("JWT_SECRET")?;

        let conta_azul = OAuthProviderConfig {
            client_id: required_env("CONTA_AZUL_CLIENT_ID")?,
            client_secret: required_env("CONTA_AZUL_CLIENT_SECRET")?,
            redirect_uri: required_env("CONTA_AZUL_REDIRECT_URI")?,
        };

        let scheduler = SchedulerConfig {
            refresh_poll_interval: Duration::from_secs(parse_env(
                "TOKEN_REFRESH_POLL_SECS",
                DEFAULT_REFRESH_POLL_SECS,
            )?),
            expiry_lookahead: ChronoDuration::seconds(parse_env(
                "TOKEN_EXPIRY_LOOKAHEAD_SECS",
                DEFAULT_EXPIRY_LOOKAHEAD_SECS,
            )?),
            cleanup_interval: Duration::from_secs(parse_env(
                "CLEANUP_INTERVAL_SECS",
                DEFAULT_CLEANUP_INTERVAL_SECS,
            )?),
            inactive_retention: ChronoDuration::days(parse_env(
                "INACTIVE_RETENTION_DAYS",
                DEFAULT_INACTIVE_RETENTION_DAYS,
            )?),
        };

        let provider_timeout = Duration::from_secs(parse_env(
            "PROVIDER_HTTP_TIMEOUT_SECS",
            DEFAULT_PROVIDER_TIMEOUT_SECS,
        )?);

        Ok(Self {
            http_port,
            database_url,
            encryption_key,
            jwt_secret,
            conta_azul,
            scheduler,
            provider_timeout,
        })
    }

    /// Decode and validate the base64-encoded encryption key
    fn decode_encryption_key(encoded: &str) -> AppResult<Vec<u8>> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::config(format!("ENCRYPTION_KEY is not valid base64: {e}")))?;
        if key.len() != 32 {
            return Err(AppError::config(format!(
                "ENCRYPTION_KEY must decode to 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(key)
    }
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name)
        .map_err(|_| AppError::config(format!("Missing required environment variable {name}")))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
