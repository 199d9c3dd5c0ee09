// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: retry with exponential backoff and store readiness.
//!
//! A replication run must not start until both stores answer. The entry
//! point calls [`wait_until_ready`] for each store before handing them to the
//! engine; the engine itself never retries.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> docmover::Result<()> {
//! use docmover::resilience::{wait_until_ready, RetryConfig};
//! use docmover::store::MemoryStore;
//!
//! let store = MemoryStore::new("destination");
//! wait_until_ready(&store, &RetryConfig::startup()).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ReplicationError, Result};
use crate::store::DocumentStore;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Configuration for connection retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: usize,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,

    /// Timeout for each individual attempt.
    pub connection_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Retry schedule for a run that is just starting.
    ///
    /// 20 attempts with 1.5x backoff from 500ms, capped at 30s. A store that
    /// is still booting gets time to come up; a wrong address fails the run
    /// instead of hanging forever.
    ///
    /// # Backoff Schedule
    ///
    /// ```text
    /// Attempt  Delay     Cumulative
    /// -------  -----     ----------
    /// 1        500ms     500ms
    /// 2        750ms     1.25s
    /// 3        1.12s     2.37s
    /// ...
    /// 20       30s       (cap)
    /// ```
    pub fn startup() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 1.5,
            connection_timeout: Duration::from_secs(10),
        }
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            connection_timeout: Duration::from_millis(500),
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let multiplier = self.backoff_factor.powi(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }

        std::cmp::min(Duration::from_secs_f64(delay_secs), self.max_delay)
    }
}

/// Ping `store` until it answers or `retry_config.max_attempts` is spent.
///
/// Each ping is bounded by `retry_config.connection_timeout`. Any ping error
/// counts as "not ready yet", whatever its kind.
pub async fn wait_until_ready<S: DocumentStore + ?Sized>(
    store: &S,
    retry_config: &RetryConfig,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;

        let last_error = match timeout(retry_config.connection_timeout, store.ping()).await {
            Ok(Ok(())) => {
                if attempt > 1 {
                    info!(store = %store.name(), attempt, "Store ready after retry");
                }
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "ping timed out after {}ms",
                retry_config.connection_timeout.as_millis()
            ),
        };

        if attempt >= retry_config.max_attempts {
            error!(
                store = %store.name(),
                attempt,
                error = %last_error,
                "Store not ready after max retries"
            );
            return Err(ReplicationError::connection(
                store.name(),
                format!("not ready after {} attempts: {}", attempt, last_error),
            ));
        }

        let delay = retry_config.delay_for_attempt(attempt);
        warn!(
            store = %store.name(),
            attempt,
            delay_ms = delay.as_millis(),
            error = %last_error,
            "Store not ready, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
