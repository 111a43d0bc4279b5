//! Full sessions: feed -> cache -> decision loop -> events -> summary

use super::{ScriptedFeed, TestUtils};
use chrono::Utc;
use parity_shadow_arb::{
    trading::{RecordingEventSink, TradeStatus},
    PriceFeed, ShadowTradingSystem,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

async fn wait_for_subscriber(feed: &ScriptedFeed) {
    while !feed.has_subscriber() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_scripted_session_round_trip() {
    let feed = Arc::new(ScriptedFeed::new());
    let mut system = ShadowTradingSystem::with_feed(TestUtils::create_test_config(), feed.clone()).unwrap();
    let recorder = Arc::new(RecordingEventSink::new());
    system.add_event_observer(recorder.clone());
    let status = system.status_receiver();

    let script = {
        let feed = feed.clone();
        async move {
            wait_for_subscriber(&feed).await;
            feed.push(TestUtils::wide_gap(Utc::now()));
            tokio::time::sleep(Duration::from_millis(1500)).await;
            feed.push(TestUtils::restored_profit(Utc::now()));
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }
    };

    let summary = system.run_until(script).await.unwrap();

    assert_eq!(summary.trades.len(), 1);
    let trade = &summary.trades[0];
    assert_eq!(trade.id, "PAPER-000001");
    assert_eq!(trade.status, TradeStatus::Closed);
    assert_eq!(trade.realized_pnl, Some(dec!(3.4)));
    assert_eq!(summary.open_trades().count(), 0);

    assert_eq!(summary.status.total_pnl, dec!(3.4));
    assert_eq!(summary.status.daily_trades, 1);
    assert!(summary.status.trading_enabled);
    assert_eq!(recorder.kinds(), vec!["ENTRY", "EXIT"]);

    let published = status.borrow().clone();
    assert_eq!(published.total_pnl, dec!(3.4));
    assert!(!feed.is_connected());
}

#[tokio::test]
async fn test_paper_session_with_simulated_prices() {
    let mut config = TestUtils::create_test_config();
    config.simulation.seed = Some(11);
    let system = ShadowTradingSystem::new(config).unwrap();
    let cache = system.cache();

    let summary = system
        .run_until(tokio::time::sleep(Duration::from_millis(2500)))
        .await
        .unwrap();

    assert!(cache.stats().accepted > 0);
    assert!(summary.ended_at >= summary.started_at);

    let closed = summary.trades.iter().filter(|t| t.status.is_closed()).count() as u32;
    assert_eq!(summary.status.closed_trades, closed);
    assert!(summary.status.open_trades <= 1);
    assert!(summary.trades.iter().all(|t| t.id.starts_with("PAPER-")));
    assert!(summary.trades.iter().all(|t| t.legs.sell_leg.quantity == 50));
}

#[tokio::test]
async fn test_changed_lot_size_refuses_to_start() {
    let mut config = TestUtils::create_test_config();
    config.contract.lot_size = 25;
    assert!(ShadowTradingSystem::new(config).is_err());
}
