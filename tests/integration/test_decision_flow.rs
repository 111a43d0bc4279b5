//! Detection -> risk -> trade lifecycle through the decision engine

use super::TestUtils;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parity_shadow_arb::{
    data::PriceCache,
    trading::{
        CycleOutcome, DecisionEngine, ExitReason, LegSide, OptionKind, RecordingEventSink, TradeEvent, TradeStatus,
        TradingCalendar,
    },
    ArbitrageError, Result,
};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Setup {
    cache: Arc<PriceCache>,
    events: Arc<RecordingEventSink>,
    engine: DecisionEngine,
}

fn create_setup() -> Setup {
    let config = Arc::new(TestUtils::create_test_config());
    let cache = Arc::new(PriceCache::new(config.staleness_limit()));
    let events = Arc::new(RecordingEventSink::new());
    let engine = DecisionEngine::new(config, Arc::clone(&cache), events.clone()).unwrap();
    Setup { cache, events, engine }
}

#[test]
fn test_profitable_round_trip() {
    let mut s = create_setup();
    let t0 = TestUtils::market_open();

    s.cache.put(TestUtils::wide_gap(t0));
    assert_eq!(
        s.engine.run_cycle(t0).unwrap(),
        CycleOutcome::Entered {
            trade_id: "PAPER-000001".to_string()
        }
    );

    let trade = s.engine.open_trade().unwrap().clone();
    assert_eq!(trade.legs.sell_leg.instrument.kind, OptionKind::Call);
    assert_eq!(trade.legs.sell_leg.side, LegSide::Sell);
    assert_eq!(trade.legs.buy_leg.instrument.kind, OptionKind::Put);
    assert_eq!(trade.legs.sell_leg.quantity, 50);
    assert_eq!(trade.entry_gap, dec!(36.6));
    assert_eq!(trade.capital_committed, dec!(1000));

    let t1 = t0 + Duration::seconds(12);
    s.cache.put(TestUtils::restored_profit(t1));
    assert_eq!(
        s.engine.run_cycle(t1).unwrap(),
        CycleOutcome::Exited {
            trade_id: "PAPER-000001".to_string(),
            realized_pnl: dec!(3.4),
        }
    );

    let closed = &s.engine.trades()[0];
    assert_eq!(closed.status, TradeStatus::Closed);
    assert_eq!(closed.exit_reason, Some(ExitReason::ParityRestored));
    assert_eq!(closed.duration_ms, Some(12_000));
    assert!(!closed.marginal);
    assert_eq!(closed.realized_pnl_total(), Some(dec!(170)));

    let status = s.engine.status_snapshot();
    assert_eq!(status.total_pnl, dec!(3.4));
    assert_eq!(status.wins, 1);
    assert!(status.trading_enabled);
    assert_eq!(status.capital_available, dec!(10170));
    assert_eq!(status.capital_committed, dec!(0));

    let events = s.events.events();
    assert_eq!(s.events.kinds(), vec!["ENTRY", "EXIT"]);
    match &events[1].event {
        TradeEvent::Exit(trade) => assert_eq!(trade.exit_gap, Some(dec!(5))),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_time_limit_exit() {
    let mut s = create_setup();
    let t0 = TestUtils::market_open();

    s.cache.put(TestUtils::wide_gap(t0));
    s.engine.run_cycle(t0).unwrap();

    // still wide just before the limit
    let t1 = t0 + Duration::seconds(299);
    s.cache.put(TestUtils::wide_gap(t1));
    assert!(matches!(s.engine.run_cycle(t1).unwrap(), CycleOutcome::Held { .. }));

    let t2 = t0 + Duration::seconds(300);
    s.cache.put(TestUtils::wide_gap(t2));
    assert!(matches!(s.engine.run_cycle(t2).unwrap(), CycleOutcome::Exited { .. }));
    assert_eq!(s.engine.trades()[0].exit_reason, Some(ExitReason::TimeLimit));
}

#[test]
fn test_parity_reason_wins_over_time_limit() {
    let mut s = create_setup();
    let t0 = TestUtils::market_open();

    s.cache.put(TestUtils::wide_gap(t0));
    s.engine.run_cycle(t0).unwrap();

    let late = t0 + Duration::seconds(600);
    s.cache.put(TestUtils::restored_profit(late));
    s.engine.run_cycle(late).unwrap();
    assert_eq!(s.engine.trades()[0].exit_reason, Some(ExitReason::ParityRestored));
}

#[test]
fn test_marginal_close_is_flagged() {
    let mut s = create_setup();
    let t0 = TestUtils::market_open();

    s.cache.put(TestUtils::wide_gap(t0));
    s.engine.run_cycle(t0).unwrap();

    // 15.5 + 0.9 - 15 = 1.4, under the 2.0 minimum profit
    let t1 = t0 + Duration::seconds(6);
    s.cache.put(TestUtils::create_snapshot(
        dec!(170),
        dec!(173),
        dec!(22000),
        t1,
        parity_shadow_arb::PriceSource::Simulated,
    ));
    assert_eq!(
        s.engine.run_cycle(t1).unwrap(),
        CycleOutcome::Exited {
            trade_id: "PAPER-000001".to_string(),
            realized_pnl: dec!(1.4),
        }
    );

    assert!(s.engine.trades()[0].marginal);
    let status = s.engine.status_snapshot();
    assert_eq!(status.marginal_closes, 1);
    assert_eq!(status.wins, 1);
    assert!(status.trading_enabled);
}

#[test]
fn test_stale_snapshot_takes_no_action() {
    let mut s = create_setup();
    let t0 = TestUtils::market_open();

    s.cache.put(TestUtils::wide_gap(t0));
    let later = t0 + Duration::seconds(301);
    assert_eq!(s.engine.run_cycle(later).unwrap(), CycleOutcome::Stale);
    assert!(s.engine.trades().is_empty());
    assert!(s.events.kinds().is_empty());
}

#[test]
fn test_narrow_gap_holds() {
    let mut s = create_setup();
    let t0 = TestUtils::market_open();

    // gap exactly at the entry threshold is not an entry
    s.cache.put(TestUtils::create_snapshot(
        dec!(177),
        dec!(150),
        dec!(22010),
        t0,
        parity_shadow_arb::PriceSource::Simulated,
    ));
    assert_eq!(
        s.engine.run_cycle(t0).unwrap(),
        CycleOutcome::Held { parity_gap: dec!(17) }
    );
    assert!(s.engine.trades().is_empty());
}

/// Calendar that fails the cycles picked by `fail_on` (1-based call count)
struct FaultyCalendar {
    calls: Arc<AtomicU32>,
    fail_on: Box<dyn Fn(u32) -> Option<ArbitrageError> + Send + Sync>,
}

impl TradingCalendar for FaultyCalendar {
    fn trading_day(&self, at: DateTime<Utc>) -> Result<NaiveDate> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match (self.fail_on)(call) {
            Some(err) => Err(err.into()),
            None => Ok(at.date_naive()),
        }
    }
}

fn create_faulty_setup(
    fail_on: impl Fn(u32) -> Option<ArbitrageError> + Send + Sync + 'static,
) -> (Setup, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let mut s = create_setup();
    s.engine = s.engine.with_calendar(Box::new(FaultyCalendar {
        calls: Arc::clone(&calls),
        fail_on: Box::new(fail_on),
    }));
    (s, calls)
}

#[tokio::test]
async fn test_invariant_violation_halts_loop() {
    let (s, calls) = create_faulty_setup(|call| {
        (call == 2).then(|| ArbitrageError::InvariantViolation("trading day moved backwards".to_string()))
    });
    let (_tx, rx) = watch::channel(false);

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), s.engine.run(rx))
        .await
        .expect("loop must stop on its own");

    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ArbitrageError>(),
        Some(ArbitrageError::InvariantViolation(_))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // no further cycles after the halt
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(s.events.kinds().is_empty());
}

#[tokio::test]
async fn test_failed_cycle_is_skipped_and_loop_continues() {
    let (s, calls) = create_faulty_setup(|call| {
        (call == 1).then(|| ArbitrageError::Trading("calendar lookup timed out".to_string()))
    });
    s.cache.put(TestUtils::wide_gap(Utc::now()));
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(s.engine.run(rx));
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    tx.send(true).unwrap();
    let summary = handle.await.unwrap().unwrap();

    assert!(calls.load(Ordering::SeqCst) >= 2);
    // the failed first cycle left no trace; the next one entered
    assert_eq!(summary.trades.len(), 1);
    assert_eq!(summary.trades[0].id, "PAPER-000001");
    assert_eq!(summary.trades[0].status, TradeStatus::Open);
    assert_eq!(summary.status.open_trades, 1);
    assert_eq!(s.events.kinds(), vec!["ENTRY"]);
}
