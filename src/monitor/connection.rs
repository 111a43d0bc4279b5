//! Ingestion liveness checks and reconnect escalation

use crate::{
    config::{ArbitrageConfig, MonitoringConfig},
    connectors::PriceFeed,
    log_health,
    monitor::health::{ConnectionHealth, LivenessHandle},
    trading::{EventSink, HealthAlertEvent, TradeEvent},
    utils::metrics,
    ArbitrageError, Result,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What a single health check decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Ingestion is live
    Healthy,
    /// Check failed, still under the reconnect threshold
    Degraded {
        /// Failed checks so far
        consecutive_failures: u32,
    },
    /// Ask the feed to reconnect after `backoff`
    Reconnect {
        /// 1-based attempt number
        attempt: u32,
        /// Delay before reconnecting
        backoff: Duration,
    },
    /// Reconnect ceiling reached; raise the health alert
    Alert {
        /// Attempts made before giving up
        attempts: u32,
    },
    /// Alert already raised for this outage
    Alerted,
}

/// Watches ingestion liveness and drives feed reconnection.
///
/// Only liveness timestamps are inspected; cached prices are never read or
/// cleared here. The alert is raised once per outage and the monitor stops
/// requesting reconnects until a snapshot arrives again.
pub struct ConnectionMonitor {
    config: MonitoringConfig,
    liveness_timeout: chrono::Duration,
    feed: Arc<dyn PriceFeed>,
    events: Arc<dyn EventSink>,
    health: Arc<Mutex<ConnectionHealth>>,
    started_at: Mutex<DateTime<Utc>>,
}

impl ConnectionMonitor {
    /// Create a monitor for `feed`. The liveness clock starts now.
    pub fn new(config: &ArbitrageConfig, feed: Arc<dyn PriceFeed>, events: Arc<dyn EventSink>) -> Self {
        Self::starting_at(config, feed, events, Utc::now())
    }

    /// Create a monitor whose liveness clock starts at `started_at`
    pub fn starting_at(
        config: &ArbitrageConfig,
        feed: Arc<dyn PriceFeed>,
        events: Arc<dyn EventSink>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config: config.monitoring.clone(),
            liveness_timeout: config.liveness_timeout(),
            feed,
            events,
            health: Arc::new(Mutex::new(ConnectionHealth::default())),
            started_at: Mutex::new(started_at),
        }
    }

    /// Restart the liveness clock used until the first snapshot arrives
    pub fn restart_clock(&self, at: DateTime<Utc>) {
        *self.started_at.lock() = at;
    }

    /// Handle for the ingestion path
    pub fn liveness(&self) -> LivenessHandle {
        LivenessHandle::new(Arc::clone(&self.health))
    }

    /// Copy of the current health state
    pub fn health(&self) -> ConnectionHealth {
        *self.health.lock()
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let delay = self.config.reconnect_backoff_base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.config.reconnect_backoff_max_ms))
    }

    /// Evaluate liveness at `now` and update the counters
    pub fn tick(&self, now: DateTime<Utc>, feed_connected: bool) -> MonitorAction {
        let started_at = *self.started_at.lock();
        let mut health = self.health.lock();
        let baseline = health.last_success_at.unwrap_or(started_at);
        let silent_for = now - baseline;

        if feed_connected && silent_for <= self.liveness_timeout {
            return MonitorAction::Healthy;
        }

        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        if health.consecutive_failures < self.config.max_consecutive_failures {
            return MonitorAction::Degraded {
                consecutive_failures: health.consecutive_failures,
            };
        }

        if health.reconnect_attempts < self.config.max_reconnect_attempts {
            health.reconnect_attempts += 1;
            let attempt = health.reconnect_attempts;
            return MonitorAction::Reconnect {
                attempt,
                backoff: self.backoff_for(attempt),
            };
        }

        if health.alerted {
            MonitorAction::Alerted
        } else {
            health.alerted = true;
            MonitorAction::Alert {
                attempts: health.reconnect_attempts,
            }
        }
    }

    /// Run one check and carry out its action.
    ///
    /// A reconnect waits out its backoff first; a shutdown signal during the
    /// wait skips the reconnect.
    pub async fn check(&self, now: DateTime<Utc>, shutdown: &mut watch::Receiver<bool>) -> Result<MonitorAction> {
        let action = self.tick(now, self.feed.is_connected());
        let feed = self.feed.name();

        match action {
            MonitorAction::Healthy => {
                debug!(feed = %feed, "Ingestion live");
            }
            MonitorAction::Degraded { consecutive_failures } => {
                log_health!(warn, feed, consecutive_failures, status = %self.feed.connection_status(), "Liveness check failed");
            }
            MonitorAction::Reconnect { attempt, backoff } => {
                let failures = self.health().consecutive_failures;
                log_health!(
                    warn,
                    feed,
                    failures,
                    attempt = attempt,
                    max_attempts = self.config.max_reconnect_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "Reconnecting feed"
                );
                metrics::record_reconnect_attempt();

                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {
                        info!(feed = %feed, "Shutdown during reconnect backoff");
                        return Ok(action);
                    }
                }

                // a failed reconnect is retried on a later tick
                if let Err(e) = self.feed.reconnect().await {
                    warn!(feed = %feed, attempt = attempt, "Reconnect failed: {}", e);
                }
            }
            MonitorAction::Alert { attempts } => {
                let health = self.health();
                let alert = ArbitrageError::HealthAlert(format!(
                    "feed {} still silent after {} reconnect attempts",
                    feed, attempts
                ));
                log_health!(
                    error,
                    feed,
                    health.consecutive_failures,
                    reconnect_attempts = attempts,
                    error = %alert,
                    "Reconnect attempts exhausted, raising health alert"
                );
                metrics::record_health_alert();
                self.events.emit(TradeEvent::HealthAlert(HealthAlertEvent {
                    feed: feed.clone(),
                    reconnect_attempts: attempts,
                    last_success_at: health.last_success_at,
                }));
            }
            MonitorAction::Alerted => {
                debug!(feed = %feed, "Health alert outstanding");
            }
        }

        Ok(action)
    }

    /// Check on a fixed schedule until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let period = Duration::from_secs(self.config.health_check_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        interval.tick().await;
        self.restart_clock(Utc::now());

        info!(
            feed = %self.feed.name(),
            interval_secs = period.as_secs(),
            "Connection monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.check(Utc::now(), &mut shutdown).await {
                        error!("Health check failed: {}", e);
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(feed = %self.feed.name(), "Connection monitor stopped");
        Ok(())
    }
}
