//! Integration tests for parity shadow arbitrage

pub mod test_connection_monitor;
pub mod test_decision_flow;
pub mod test_price_cache;
pub mod test_risk_limits;
pub mod test_shadow_session;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parity_shadow_arb::{
    config::{ArbitrageConfig, TradingMode},
    connectors::{ConnectionStatus, PriceFeed, SnapshotCallback},
    data::{PriceSnapshot, PriceSource},
    Result,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Test utilities for integration tests
pub struct TestUtils;

impl TestUtils {
    /// Default configuration with a fast decision loop
    pub fn create_test_config() -> ArbitrageConfig {
        let mut config = ArbitrageConfig::default();
        config.mode = TradingMode::Paper;
        config.execution.decision_interval_secs = 1;
        config.market_data.poll_interval_ms = 20;
        config
    }

    /// 09:30 IST on a weekday
    pub fn market_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 4, 0, 0).unwrap()
    }

    /// ATM 22000 snapshot with spot 22010
    pub fn create_snapshot(
        call: Decimal,
        put: Decimal,
        futures: Decimal,
        at: DateTime<Utc>,
        source: PriceSource,
    ) -> PriceSnapshot {
        PriceSnapshot::new(dec!(22010), futures, dec!(22000), call, put, at, source)
    }

    /// Gap 36.6: sell the call, buy the put
    pub fn wide_gap(at: DateTime<Utc>) -> PriceSnapshot {
        Self::create_snapshot(dec!(185.50), dec!(172.10), dec!(22050), at, PriceSource::Simulated)
    }

    /// Gap 5 after a wide entry: realized +3.4 per unit
    pub fn restored_profit(at: DateTime<Utc>) -> PriceSnapshot {
        Self::create_snapshot(dec!(170), dec!(175), dec!(22000), at, PriceSource::Simulated)
    }

    /// Gap 5 after a wide entry: realized -6.6 per unit
    pub fn restored_loss(at: DateTime<Utc>) -> PriceSnapshot {
        Self::create_snapshot(dec!(150), dec!(145), dec!(22000), at, PriceSource::Simulated)
    }
}

/// Feed driven by the test: snapshots are pushed by hand and connection
/// state is toggled directly.
#[derive(Default)]
pub struct ScriptedFeed {
    connected: AtomicBool,
    fail_reconnect: AtomicBool,
    reconnects: AtomicU32,
    callbacks: Mutex<Vec<SnapshotCallback>>,
}

impl ScriptedFeed {
    /// Disconnected feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `snapshot` to every callback
    pub fn push(&self, snapshot: PriceSnapshot) {
        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }

    /// Whether a callback has been registered
    pub fn has_subscriber(&self) -> bool {
        !self.callbacks.lock().is_empty()
    }

    /// Simulate a dropped connection
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Make reconnects fail and leave the feed down
    pub fn fail_reconnects(&self) {
        self.fail_reconnect.store(true, Ordering::SeqCst);
    }

    /// Reconnects requested so far
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_snapshot(&self, callback: SnapshotCallback) {
        self.callbacks.lock().push(callback);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_status(&self) -> ConnectionStatus {
        if self.is_connected() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconnect.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("scripted reconnect failure"));
        }
        self.connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}
