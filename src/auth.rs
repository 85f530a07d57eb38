// ABOUTME: Bearer-token authentication for route callers
// ABOUTME: Validates HS256 JWTs and extracts the calling user's identity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

use crate::errors::{AppError, AppResult};
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by caller Bearer tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID
    pub sub: String,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// Validates caller Bearer tokens on protected routes
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthManager {
    /// Create an auth manager from the shared HS256 secret
    #[must_use]
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    /// Issue a token for a user (used by the account/login surface and tests)
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails.
    pub fn generate_token(&self, user_id: Uuid, ttl_secs: i64) -> AppResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Token generation failed: {e}")))
    }

    /// Validate a raw JWT and return the calling user's id
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` if the token is malformed, expired, or carries
    /// a non-UUID subject.
    pub fn validate_token(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| AppError::AuthInvalid(format!("Invalid token: {e}")))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::AuthInvalid("Token subject is not a valid user id".into()))
    }

    /// Extract and validate the Bearer token from request headers
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when the Authorization header is missing or
    /// not a Bearer scheme, and `AuthInvalid` when validation fails.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<Uuid> {
        let header_value = headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::AuthRequired("Authorization header is required".into()))?;

        let header_str = header_value
            .to_str()
            .map_err(|_| AppError::AuthRequired("Invalid Authorization header encoding".into()))?;

        let token = header_str.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::AuthRequired("Authorization header must use Bearer scheme".into())
        })?;

        self.validate_token(token)
    }
}
