// ABOUTME: OAuth integration and token-lifecycle service for the Conta Azul API
// ABOUTME: Library root wiring providers, credential store, orchestration, and HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

//! # Conta Bridge
//!
//! Connects user accounts to external business-management services over
//! OAuth2 and keeps the stored credentials usable without user
//! intervention:
//!
//! - **Providers**: adapter per external service ([`providers`]), collected
//!   in an immutable registry at startup.
//! - **Credential store**: one encrypted record per `(user, provider)`
//!   ([`database`]).
//! - **Orchestration**: authorization, code exchange, persistence, and
//!   single-flight refresh ([`oauth`]).
//! - **Lifecycle**: proactive renewal ahead of expiry and retention-based
//!   cleanup of deactivated records ([`scheduler`]), plus on-demand
//!   validation with lazy refresh ([`oauth::token_validation`]).
//! - **HTTP surface**: thin authorize/callback/status endpoints
//!   ([`routes`]).

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Caller authentication (Bearer JWTs)
pub mod auth;
/// Environment-based configuration
pub mod config;
/// Database access and token encryption at rest
pub mod database;
/// Error taxonomy and HTTP mapping
pub mod errors;
/// Logging initialization
pub mod logging;
/// Shared data models
pub mod models;
/// OAuth orchestration and token validation
pub mod oauth;
/// Provider adapters and registry
pub mod providers;
/// HTTP routes
pub mod routes;
/// Background token-lifecycle jobs
pub mod scheduler;

pub use errors::{AppError, AppResult};
