//! Thread-safe, freshness-aware holder of the latest price snapshot.

use crate::data::PriceSnapshot;
use crate::utils::metrics;
use crate::ArbitrageError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of offering a snapshot to the cache
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    /// Snapshot is now the cached one
    Accepted,
    /// Snapshot is older than the cached one
    OutOfOrder {
        /// Timestamp currently held
        cached_at: DateTime<Utc>,
        /// Timestamp that was refused
        offered_at: DateTime<Utc>,
    },
    /// A price field failed validation
    Invalid(String),
}

impl PutOutcome {
    /// Whether the snapshot was stored
    pub fn is_accepted(&self) -> bool {
        matches!(self, PutOutcome::Accepted)
    }
}

/// Counters kept by the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Snapshots stored
    pub accepted: u64,
    /// Snapshots refused for invalid prices
    pub rejected_invalid: u64,
    /// Snapshots refused for being older than the cached one
    pub rejected_out_of_order: u64,
}

/// Holds at most one snapshot, replaced atomically.
///
/// Writers are serialized by the write lock, so the timestamp comparison and
/// the replacement happen as one step and a later snapshot can never be
/// overwritten by an earlier one. Readers only clone an `Arc`.
pub struct PriceCache {
    current: RwLock<Option<Arc<PriceSnapshot>>>,
    staleness_limit: chrono::Duration,
    accepted: AtomicU64,
    rejected_invalid: AtomicU64,
    rejected_out_of_order: AtomicU64,
}

impl PriceCache {
    /// Create an empty cache
    pub fn new(staleness_limit: chrono::Duration) -> Self {
        Self {
            current: RwLock::new(None),
            staleness_limit,
            accepted: AtomicU64::new(0),
            rejected_invalid: AtomicU64::new(0),
            rejected_out_of_order: AtomicU64::new(0),
        }
    }

    /// Offer a snapshot. Rejections are reported, never raised.
    pub fn put(&self, snapshot: PriceSnapshot) -> PutOutcome {
        if let Err(e) = snapshot.validate() {
            self.rejected_invalid.fetch_add(1, Ordering::Relaxed);
            metrics::record_snapshot_rejected("invalid");
            return PutOutcome::Invalid(e.to_string());
        }

        let mut current = self.current.write();
        if let Some(cached) = current.as_ref() {
            if snapshot.observed_at < cached.observed_at {
                self.rejected_out_of_order.fetch_add(1, Ordering::Relaxed);
                metrics::record_snapshot_rejected("out_of_order");
                return PutOutcome::OutOfOrder {
                    cached_at: cached.observed_at,
                    offered_at: snapshot.observed_at,
                };
            }
        }
        *current = Some(Arc::new(snapshot));
        drop(current);

        self.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::record_snapshot_accepted();
        PutOutcome::Accepted
    }

    /// Current snapshot if it is inside the freshness window
    pub fn get(&self) -> Option<Arc<PriceSnapshot>> {
        self.get_at(Utc::now())
    }

    /// Current snapshot if it is inside the freshness window at `now`
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<Arc<PriceSnapshot>> {
        let snapshot = self.current.read().clone()?;
        if snapshot.age(now) <= self.staleness_limit {
            Some(snapshot)
        } else {
            None
        }
    }

    /// Like [`get_at`](Self::get_at) but explains why nothing is usable
    pub fn fresh_at(&self, now: DateTime<Utc>) -> Result<Arc<PriceSnapshot>, ArbitrageError> {
        match self.current.read().clone() {
            None => Err(ArbitrageError::StaleData("no snapshot received yet".to_string())),
            Some(snapshot) if snapshot.age(now) > self.staleness_limit => Err(ArbitrageError::StaleData(format!(
                "last snapshot is {}s old (limit {}s)",
                snapshot.age(now).num_seconds(),
                self.staleness_limit.num_seconds()
            ))),
            Some(snapshot) => Ok(snapshot),
        }
    }

    /// Last accepted snapshot regardless of age
    pub fn latest(&self) -> Option<Arc<PriceSnapshot>> {
        self.current.read().clone()
    }

    /// Configured freshness window
    pub fn staleness_limit(&self) -> chrono::Duration {
        self.staleness_limit
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            rejected_out_of_order: self.rejected_out_of_order.load(Ordering::Relaxed),
        }
    }
}
