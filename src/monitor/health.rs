//! Ingestion liveness state

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Liveness bookkeeping for the ingestion feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    /// Last delivered snapshot
    pub last_success_at: Option<DateTime<Utc>>,
    /// Failed checks since the last delivery
    pub consecutive_failures: u32,
    /// Reconnects requested since the last delivery
    pub reconnect_attempts: u32,
    /// Whether the health alert for the current outage was raised
    pub alerted: bool,
}

/// Handle given to the ingestion path to report deliveries.
///
/// Cloned into the feed callback; shares state with the monitor that
/// created it.
#[derive(Debug, Clone)]
pub struct LivenessHandle {
    health: Arc<Mutex<ConnectionHealth>>,
}

impl LivenessHandle {
    pub(crate) fn new(health: Arc<Mutex<ConnectionHealth>>) -> Self {
        Self { health }
    }

    /// Record a successful ingestion event
    pub fn record_success(&self, at: DateTime<Utc>) {
        let mut health = self.health.lock();
        if health.last_success_at.map_or(true, |last| at > last) {
            health.last_success_at = Some(at);
        }
        health.consecutive_failures = 0;
        health.reconnect_attempts = 0;
        health.alerted = false;
    }

    /// Copy of the current state
    pub fn health(&self) -> ConnectionHealth {
        *self.health.lock()
    }
}
