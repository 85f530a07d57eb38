// ABOUTME: OAuth integration orchestration layer
// ABOUTME: Coordinates provider adapters, the credential store, and token validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

//! # OAuth Orchestration
//!
//! [`OAuthManager`] is the only component that composes provider adapters
//! with the credential store; routes, the scheduler, and the validator all
//! go through it. Refreshes for the same `(user, provider)` credential are
//! serialized so concurrent callers cannot burn a single-use refresh token
//! twice.

/// Integration orchestrator
pub mod manager;
/// On-demand token validation
pub mod token_validation;

pub use manager::OAuthManager;
pub use token_validation::TokenValidator;
