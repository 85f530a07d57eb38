// ABOUTME: Scheduled token-lifecycle jobs: proactive renewal and inactive-record cleanup
// ABOUTME: Runs interval loops that scan the credential store and act through the orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Conta Bridge Contributors

//! # Token Lifecycle Scheduler
//!
//! Two background jobs keep the credential store healthy:
//!
//! - the renewal tick scans for active, refreshable credentials expiring
//!   within a look-ahead window and refreshes them before callers notice;
//! - the cleanup tick deletes records that have been inactive for longer
//!   than the retention period.
//!
//! Both ticks are exposed as public methods so tests and operational
//! tooling can drive a single pass without the interval loop.

use crate::config::SchedulerConfig;
use crate::errors::AppResult;
use crate::oauth::OAuthManager;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of one renewal tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenewalOutcome {
    /// Credentials found in the expiry window
    pub scanned: usize,
    /// Credentials successfully refreshed
    pub refreshed: usize,
    /// Credentials deactivated after a rejected refresh token
    pub deactivated: usize,
    /// Credentials left for retry after a transient failure
    pub failed: usize,
}

/// Background driver for the token-lifecycle jobs
pub struct TokenRefreshScheduler {
    manager: Arc<OAuthManager>,
    config: SchedulerConfig,
}

impl TokenRefreshScheduler {
    /// Create a scheduler over the shared orchestrator
    #[must_use]
    pub const fn new(manager: Arc<OAuthManager>, config: SchedulerConfig) -> Self {
        Self { manager, config }
    }

    /// Spawn both interval loops, returning their task handles
    ///
    /// Each loop logs and swallows tick-level errors so a failed pass never
    /// kills the job; the next interval retries from a clean scan.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let renewal = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scheduler.config.refresh_poll_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.run_renewal_tick().await {
                        error!(error = %e, "Token renewal tick failed");
                    }
                }
            })
        };

        let cleanup = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scheduler.config.cleanup_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.run_cleanup_tick().await {
                        error!(error = %e, "Integration cleanup tick failed");
                    }
                }
            })
        };

        info!(
            poll_interval = ?self.config.refresh_poll_interval,
            lookahead = %self.config.expiry_lookahead,
            cleanup_interval = ?self.config.cleanup_interval,
            retention = %self.config.inactive_retention,
            "Token lifecycle scheduler started"
        );

        (renewal, cleanup)
    }

    /// Run one proactive-renewal pass
    ///
    /// Scans for active, refreshable credentials expiring within the
    /// look-ahead window and refreshes them sequentially. Failures are
    /// isolated per credential: a rejected refresh token deactivates that
    /// record, any other failure (including timeouts) leaves it for the
    /// next tick, and the pass continues either way.
    ///
    /// # Errors
    ///
    /// Returns an error only if the expiry-window scan itself fails.
    pub async fn run_renewal_tick(&self) -> AppResult<RenewalOutcome> {
        let expiring = self
            .manager
            .database()
            .find_expiring_integrations(self.config.expiry_lookahead)
            .await?;

        let mut outcome = RenewalOutcome {
            scanned: expiring.len(),
            ..RenewalOutcome::default()
        };

        if expiring.is_empty() {
            debug!("No credentials due for renewal");
            return Ok(outcome);
        }

        info!(count = expiring.len(), "Renewing credentials nearing expiry");

        for integration in expiring {
            match self.manager.refresh_integration_token(&integration.id).await {
                Ok(_) => outcome.refreshed += 1,
                Err(e) if e.is_invalid_grant() => {
                    warn!(
                        integration_id = %integration.id,
                        user_id = %integration.user_id,
                        provider = %integration.provider,
                        error = %e,
                        "Refresh token rejected; deactivating integration"
                    );
                    if let Err(e) = self.manager.deactivate_integration(&integration.id).await {
                        error!(
                            integration_id = %integration.id,
                            error = %e,
                            "Failed to deactivate integration"
                        );
                    } else {
                        outcome.deactivated += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        integration_id = %integration.id,
                        user_id = %integration.user_id,
                        provider = %integration.provider,
                        error = %e,
                        "Refresh failed; will retry on the next tick"
                    );
                    outcome.failed += 1;
                }
            }
        }

        info!(
            refreshed = outcome.refreshed,
            deactivated = outcome.deactivated,
            failed = outcome.failed,
            "Renewal tick complete"
        );

        Ok(outcome)
    }

    /// Run one cleanup pass
    ///
    /// Deletes integrations that have been inactive since before the
    /// retention cutoff. Active records are never touched, no matter how
    /// old.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    pub async fn run_cleanup_tick(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - self.config.inactive_retention;
        let removed = self
            .manager
            .database()
            .delete_inactive_integrations_older_than(cutoff)
            .await?;

        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Purged stale inactive integrations");
        } else {
            debug!(cutoff = %cutoff, "No stale inactive integrations to purge");
        }

        Ok(removed)
    }
}
