//! Prometheus metric names and recording helpers
//!
//! Recording is a no-op until an exporter is installed, so library code and
//! tests call these helpers unconditionally.

use crate::{ArbitrageError, Result};
use metrics::{gauge, increment_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::net::SocketAddr;

/// Snapshots stored by the price cache
pub const SNAPSHOTS_ACCEPTED: &str = "parity_snapshots_accepted_total";
/// Snapshots refused by the price cache, labelled by reason
pub const SNAPSHOTS_REJECTED: &str = "parity_snapshots_rejected_total";
/// Decision cycles skipped for lack of fresh data
pub const STALE_CYCLES: &str = "parity_stale_cycles_total";
/// Simulated entries
pub const TRADE_ENTRIES: &str = "parity_trade_entries_total";
/// Simulated exits, labelled by reason
pub const TRADE_EXITS: &str = "parity_trade_exits_total";
/// Entries refused by risk rules, labelled by rule
pub const RISK_BLOCKS: &str = "parity_risk_blocks_total";
/// Feed reconnect attempts
pub const RECONNECT_ATTEMPTS: &str = "parity_reconnect_attempts_total";
/// Health alerts raised
pub const HEALTH_ALERTS: &str = "parity_health_alerts_total";
/// Last observed parity gap
pub const PARITY_GAP: &str = "parity_gap";
/// Cumulative simulated P&L per unit
pub const TOTAL_PNL: &str = "parity_total_pnl";

/// Start the Prometheus scrape endpoint
pub fn install_prometheus_exporter(listen_addr: &str) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|e| ArbitrageError::Config(format!("Invalid metrics address '{}': {}", listen_addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ArbitrageError::Config(format!("Failed to install metrics exporter: {}", e)))?;

    Ok(())
}

/// Count an accepted snapshot
pub fn record_snapshot_accepted() {
    increment_counter!(SNAPSHOTS_ACCEPTED);
}

/// Count a rejected snapshot
pub fn record_snapshot_rejected(reason: &'static str) {
    increment_counter!(SNAPSHOTS_REJECTED, "reason" => reason);
}

/// Count a cycle skipped on stale data
pub fn record_stale_cycle() {
    increment_counter!(STALE_CYCLES);
}

/// Publish the latest parity gap
pub fn record_parity_gap(gap: Decimal) {
    gauge!(PARITY_GAP, to_f64(gap));
}

/// Count an entry
pub fn record_trade_entry() {
    increment_counter!(TRADE_ENTRIES);
}

/// Count an exit and publish the running total
pub fn record_trade_exit(reason: &'static str, total_pnl: Decimal) {
    increment_counter!(TRADE_EXITS, "reason" => reason);
    gauge!(TOTAL_PNL, to_f64(total_pnl));
}

/// Count an entry refused by a risk rule
pub fn record_risk_block(rule: &'static str) {
    increment_counter!(RISK_BLOCKS, "rule" => rule);
}

/// Count a reconnect attempt
pub fn record_reconnect_attempt() {
    increment_counter!(RECONNECT_ATTEMPTS);
}

/// Count a health alert
pub fn record_health_alert() {
    increment_counter!(HEALTH_ALERTS);
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
