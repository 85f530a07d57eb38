// ABOUTME: Lifecycle job behavior: renewal tick windowing and failure isolation, cleanup retention
// ABOUTME: Drives single scheduler passes without the interval loops
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

mod common;

use chrono::{Duration, Utc};
use common::{insert_integration, test_manager, MockProvider, RefreshMode, MOCK_PROVIDER};
use conta_bridge::config::SchedulerConfig;
use conta_bridge::scheduler::TokenRefreshScheduler;
use std::sync::Arc;
use uuid::Uuid;

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        expiry_lookahead: Duration::minutes(5),
        inactive_retention: Duration::days(30),
        ..SchedulerConfig::default()
    }
}

#[tokio::test]
async fn renewal_tick_refreshes_only_credentials_inside_the_window() {
    let provider = Arc::new(MockProvider::new());
    let (manager, db) = test_manager(Arc::clone(&provider)).await;

    // Inside the 5-minute window
    let due = insert_integration(
        &db,
        Uuid::new_v4(),
        MOCK_PROVIDER,
        Utc::now() + Duration::minutes(4),
        Some("rt"),
    )
    .await;
    // Outside the window
    let later = insert_integration(
        &db,
        Uuid::new_v4(),
        MOCK_PROVIDER,
        Utc::now() + Duration::minutes(6),
        Some("rt"),
    )
    .await;

    let scheduler = TokenRefreshScheduler::new(manager, test_config());
    let outcome = scheduler.run_renewal_tick().await.unwrap();

    assert_eq!(outcome.scanned, 1);
    assert_eq!(outcome.refreshed, 1);
    assert_eq!(outcome.deactivated, 0);
    assert_eq!(outcome.failed, 0);
    assert_eq!(provider.refresh_call_count(), 1);

    let renewed = db.get_integration_by_id(&due.id).await.unwrap().unwrap();
    assert!(renewed.expires_at > due.expires_at);
    let untouched = db.get_integration_by_id(&later.id).await.unwrap().unwrap();
    assert_eq!(untouched.expires_at, later.expires_at);
}

#[tokio::test]
async fn renewal_tick_is_a_noop_when_nothing_is_due() {
    let provider = Arc::new(MockProvider::new());
    let (manager, _db) = test_manager(Arc::clone(&provider)).await;

    let scheduler = TokenRefreshScheduler::new(manager, test_config());
    let outcome = scheduler.run_renewal_tick().await.unwrap();

    assert_eq!(outcome.scanned, 0);
    assert_eq!(provider.refresh_call_count(), 0);
}

#[tokio::test]
async fn rejected_refresh_token_deactivates_the_credential() {
    let provider = Arc::new(MockProvider::new());
    provider.set_refresh_mode(RefreshMode::InvalidGrant);
    let (manager, db) = test_manager(Arc::clone(&provider)).await;
    let stored = insert_integration(
        &db,
        Uuid::new_v4(),
        MOCK_PROVIDER,
        Utc::now() + Duration::minutes(2),
        Some("rt-revoked"),
    )
    .await;

    let scheduler = TokenRefreshScheduler::new(manager, test_config());
    let outcome = scheduler.run_renewal_tick().await.unwrap();

    assert_eq!(outcome.deactivated, 1);
    assert_eq!(outcome.refreshed, 0);

    // Deactivated, never deleted
    let record = db.get_integration_by_id(&stored.id).await.unwrap().unwrap();
    assert!(!record.is_active);
}

#[tokio::test]
async fn transient_failure_leaves_the_credential_active_for_retry() {
    let provider = Arc::new(MockProvider::new());
    provider.set_refresh_mode(RefreshMode::Transient);
    let (manager, db) = test_manager(Arc::clone(&provider)).await;
    let stored = insert_integration(
        &db,
        Uuid::new_v4(),
        MOCK_PROVIDER,
        Utc::now() + Duration::minutes(2),
        Some("rt"),
    )
    .await;

    let scheduler = TokenRefreshScheduler::new(manager, test_config());
    let outcome = scheduler.run_renewal_tick().await.unwrap();

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.deactivated, 0);

    let record = db.get_integration_by_id(&stored.id).await.unwrap().unwrap();
    assert!(record.is_active);

    // Once the remote recovers, the next tick picks the credential up again
    provider.set_refresh_mode(RefreshMode::Succeed);
    let outcome = scheduler.run_renewal_tick().await.unwrap();
    assert_eq!(outcome.refreshed, 1);
}

#[tokio::test]
async fn one_bad_credential_does_not_block_the_rest_of_the_pass() {
    let provider = Arc::new(MockProvider::new());
    let (manager, db) = test_manager(Arc::clone(&provider)).await;

    // Expires soonest and always fails with a transient error
    insert_integration(
        &db,
        Uuid::new_v4(),
        MOCK_PROVIDER,
        Utc::now() + Duration::minutes(1),
        Some("rt-fail-transient"),
    )
    .await;
    let healthy = insert_integration(
        &db,
        Uuid::new_v4(),
        MOCK_PROVIDER,
        Utc::now() + Duration::minutes(2),
        Some("rt"),
    )
    .await;

    let scheduler = TokenRefreshScheduler::new(manager, test_config());
    let outcome = scheduler.run_renewal_tick().await.unwrap();

    assert_eq!(outcome.scanned, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.refreshed, 1);
    let renewed = db.get_integration_by_id(&healthy.id).await.unwrap().unwrap();
    assert!(renewed.expires_at > healthy.expires_at);
}

#[tokio::test]
async fn cleanup_tick_applies_the_retention_cutoff() {
    let (manager, db) = test_manager(Arc::new(MockProvider::new())).await;
    let expires = Utc::now() + Duration::hours(1);

    let stale = insert_integration(&db, Uuid::new_v4(), MOCK_PROVIDER, expires, Some("rt")).await;
    db.set_integration_active(&stale.id, false).await.unwrap();
    sqlx::query("UPDATE integrations SET updated_at = $2 WHERE id = $1")
        .bind(&stale.id)
        .bind(Utc::now() - Duration::days(31))
        .execute(db.pool())
        .await
        .unwrap();

    let recent = insert_integration(&db, Uuid::new_v4(), MOCK_PROVIDER, expires, Some("rt")).await;
    db.set_integration_active(&recent.id, false).await.unwrap();

    let scheduler = TokenRefreshScheduler::new(manager, test_config());
    let removed = scheduler.run_cleanup_tick().await.unwrap();

    assert_eq!(removed, 1);
    assert!(db.get_integration_by_id(&stale.id).await.unwrap().is_none());
    assert!(db.get_integration_by_id(&recent.id).await.unwrap().is_some());
}
