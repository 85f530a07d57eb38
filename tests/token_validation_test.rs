// ABOUTME: On-demand validation: pass-through for live tokens, lazy refresh for expired ones
// ABOUTME: Drives TokenValidator over the orchestrator and mock provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

mod common;

use chrono::{Duration, Utc};
use common::{insert_integration, test_manager, MockProvider, RefreshMode, MOCK_PROVIDER};
use conta_bridge::errors::AppError;
use conta_bridge::oauth::TokenValidator;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn live_token_is_returned_without_a_remote_call() {
    let provider = Arc::new(MockProvider::new());
    let (manager, db) = test_manager(Arc::clone(&provider)).await;
    let user_id = Uuid::new_v4();
    insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() + Duration::hours(1),
        Some("rt"),
    )
    .await;

    let validator = TokenValidator::new(manager);
    let token = validator.get_valid_token(user_id, MOCK_PROVIDER).await.unwrap();

    assert_eq!(token, "at-stored");
    assert_eq!(provider.refresh_call_count(), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_transparently() {
    let provider = Arc::new(MockProvider::new());
    let (manager, db) = test_manager(Arc::clone(&provider)).await;
    let user_id = Uuid::new_v4();
    insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() - Duration::minutes(10),
        Some("rt"),
    )
    .await;

    let validator = TokenValidator::new(manager);
    let token = validator.get_valid_token(user_id, MOCK_PROVIDER).await.unwrap();

    assert_eq!(token, "at-refreshed-1");
    assert_eq!(provider.refresh_call_count(), 1);

    // The renewed material is persisted, so the next call is a pass-through
    let token = validator.get_valid_token(user_id, MOCK_PROVIDER).await.unwrap();
    assert_eq!(token, "at-refreshed-1");
    assert_eq!(provider.refresh_call_count(), 1);
}

#[tokio::test]
async fn missing_integration_is_reported_as_not_found() {
    let (manager, _db) = test_manager(Arc::new(MockProvider::new())).await;
    let validator = TokenValidator::new(manager);

    let err = validator
        .get_valid_token(Uuid::new_v4(), MOCK_PROVIDER)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IntegrationNotFound { .. }));
}

#[tokio::test]
async fn deactivated_integration_is_reported_as_not_found() {
    let (manager, db) = test_manager(Arc::new(MockProvider::new())).await;
    let user_id = Uuid::new_v4();
    let stored = insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() + Duration::hours(1),
        Some("rt"),
    )
    .await;
    db.set_integration_active(&stored.id, false).await.unwrap();

    let validator = TokenValidator::new(manager);
    let err = validator.get_valid_token(user_id, MOCK_PROVIDER).await.unwrap_err();
    assert!(matches!(err, AppError::IntegrationNotFound { .. }));
}

#[tokio::test]
async fn expired_token_without_refresh_token_cannot_be_renewed() {
    let (manager, db) = test_manager(Arc::new(MockProvider::new())).await;
    let user_id = Uuid::new_v4();
    insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() - Duration::minutes(1),
        None,
    )
    .await;

    let validator = TokenValidator::new(manager);
    let err = validator.get_valid_token(user_id, MOCK_PROVIDER).await.unwrap_err();
    assert!(matches!(err, AppError::NotRefreshable));
}

#[tokio::test]
async fn refresh_failure_propagates_to_the_caller() {
    let provider = Arc::new(MockProvider::new());
    provider.set_refresh_mode(RefreshMode::Transient);
    let (manager, db) = test_manager(Arc::clone(&provider)).await;
    let user_id = Uuid::new_v4();
    insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() - Duration::minutes(1),
        Some("rt"),
    )
    .await;

    let validator = TokenValidator::new(manager);
    let err = validator.get_valid_token(user_id, MOCK_PROVIDER).await.unwrap_err();
    assert!(matches!(err, AppError::Provider { .. }));
}

#[tokio::test]
async fn validity_check_is_a_pure_read() {
    let provider = Arc::new(MockProvider::new());
    let (manager, db) = test_manager(Arc::clone(&provider)).await;
    let user_id = Uuid::new_v4();
    let validator = TokenValidator::new(manager);

    // No integration at all
    assert!(!validator.is_token_valid(user_id, MOCK_PROVIDER).await.unwrap());

    let stored = insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() + Duration::hours(1),
        Some("rt"),
    )
    .await;
    assert!(validator.is_token_valid(user_id, MOCK_PROVIDER).await.unwrap());

    // Expired: reported invalid, but never refreshed
    db.update_integration_tokens(
        &stored.id,
        "at-stale",
        Some("rt"),
        Utc::now() - Duration::minutes(1),
    )
    .await
    .unwrap();
    assert!(!validator.is_token_valid(user_id, MOCK_PROVIDER).await.unwrap());
    assert_eq!(provider.refresh_call_count(), 0);
}

#[tokio::test]
async fn expiry_info_reports_remaining_lifetime() {
    let (manager, db) = test_manager(Arc::new(MockProvider::new())).await;
    let user_id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::minutes(10);
    insert_integration(&db, user_id, MOCK_PROVIDER, expires_at, Some("rt")).await;

    let validator = TokenValidator::new(manager);
    let info = validator
        .token_expiry_info(user_id, MOCK_PROVIDER)
        .await
        .unwrap()
        .unwrap();

    assert!(!info.is_expired);
    assert_eq!(info.expires_at, expires_at);
    assert!(info.millis_remaining > 0 && info.millis_remaining <= 10 * 60 * 1000);
}

#[tokio::test]
async fn expiry_info_is_absent_when_not_connected() {
    let (manager, db) = test_manager(Arc::new(MockProvider::new())).await;
    let user_id = Uuid::new_v4();
    let validator = TokenValidator::new(manager);

    // No integration at all
    assert!(validator
        .token_expiry_info(user_id, MOCK_PROVIDER)
        .await
        .unwrap()
        .is_none());

    // Deactivated integrations count as not connected too
    let stored = insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() + Duration::hours(1),
        Some("rt"),
    )
    .await;
    db.set_integration_active(&stored.id, false).await.unwrap();

    assert!(validator
        .token_expiry_info(user_id, MOCK_PROVIDER)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn expiry_info_clamps_remaining_time_at_zero() {
    let (manager, db) = test_manager(Arc::new(MockProvider::new())).await;
    let user_id = Uuid::new_v4();
    insert_integration(
        &db,
        user_id,
        MOCK_PROVIDER,
        Utc::now() - Duration::minutes(5),
        Some("rt"),
    )
    .await;

    let validator = TokenValidator::new(manager);
    let info = validator
        .token_expiry_info(user_id, MOCK_PROVIDER)
        .await
        .unwrap()
        .unwrap();

    assert!(info.is_expired);
    assert_eq!(info.millis_remaining, 0);
}
