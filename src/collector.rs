use crate::http::{ClientPool, RateLimitSource};
use crate::metrics::SnapshotStore;
use crate::types::RateLimitCategory;
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Polls every account in the pool and records the results in the store.
pub struct Collector {
    pool: ClientPool,
    store: Arc<SnapshotStore>,
}

/// Outcome of one poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub updated: usize,
    pub failed: usize,
}

impl Collector {
    pub fn new(pool: ClientPool, store: Arc<SnapshotStore>) -> Self {
        Self { pool, store }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Run one pass: fetch every account concurrently and return once all of
    /// them have finished, successfully or not.
    pub async fn update(&self) -> PassSummary {
        debug!("Polling {} accounts", self.pool.len());
        let results = join_all(
            self.pool
                .iter()
                .map(|(account, source)| self.update_account(account, source.as_ref())),
        )
        .await;
        let updated = results.iter().filter(|ok| **ok).count();
        PassSummary {
            updated,
            failed: results.len() - updated,
        }
    }

    async fn update_account(&self, account: &str, source: &dyn RateLimitSource) -> bool {
        let limits = match source.fetch_rate_limits().await {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    "Error fetching rate limits for user {} ({}): {}",
                    account,
                    e.code(),
                    e
                );
                return false;
            }
        };
        self.store.record(account, &limits);

        let fmt = |c: RateLimitCategory| {
            limits
                .get(c)
                .map(|w| format!("{}/{}", w.remaining, w.limit))
                .unwrap_or_else(|| "-".to_string())
        };
        let core_reset = limits
            .get(RateLimitCategory::Core)
            .and_then(|w| chrono::DateTime::<chrono::Utc>::from_timestamp(w.reset, 0))
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "Updated rate limits for user {}: Core={} (reset {}), Search={}, GraphQL={}",
            account,
            fmt(RateLimitCategory::Core),
            core_reset,
            fmt(RateLimitCategory::Search),
            fmt(RateLimitCategory::Graphql),
        );
        true
    }

    /// Poll immediately, then once per `interval` until `shutdown` flips to
    /// true (or its sender is dropped). A pass in progress always finishes.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately and drives the warm-up pass.
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.update().await;
                }
            }
        }
        info!("Stopping rate limit polling");
    }
}
