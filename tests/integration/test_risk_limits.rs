//! Risk rules enforced through the decision engine

use super::TestUtils;
use chrono::Duration;
use parity_shadow_arb::{
    config::{ArbitrageConfig, TradingMode},
    data::{PriceCache, PriceSource},
    trading::{
        CycleOutcome, DecisionEngine, FixedOffsetCalendar, RecordingEventSink, RiskBlockReason, TradeEvent,
        TradeStatus,
    },
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn create_engine(config: ArbitrageConfig) -> (Arc<PriceCache>, Arc<RecordingEventSink>, DecisionEngine) {
    let config = Arc::new(config);
    let cache = Arc::new(PriceCache::new(config.staleness_limit()));
    let events = Arc::new(RecordingEventSink::new());
    let engine = DecisionEngine::new(config, Arc::clone(&cache), events.clone())
        .unwrap()
        .with_calendar(Box::new(FixedOffsetCalendar::new(330).unwrap()));
    (cache, events, engine)
}

#[test]
fn test_daily_limit_and_rollover() {
    let (cache, events, mut engine) = create_engine(TestUtils::create_test_config());
    let mut t = TestUtils::market_open();

    for _ in 0..3 {
        cache.put(TestUtils::wide_gap(t));
        assert!(matches!(engine.run_cycle(t).unwrap(), CycleOutcome::Entered { .. }));
        t += Duration::seconds(3);
        cache.put(TestUtils::restored_profit(t));
        assert!(matches!(engine.run_cycle(t).unwrap(), CycleOutcome::Exited { .. }));
        t += Duration::seconds(3);
    }

    cache.put(TestUtils::wide_gap(t));
    assert_eq!(
        engine.run_cycle(t).unwrap(),
        CycleOutcome::Blocked(RiskBlockReason::DailyLimit { count: 3, limit: 3 })
    );
    // same episode: no second RISK_BLOCK
    t += Duration::seconds(3);
    cache.put(TestUtils::wide_gap(t));
    assert!(matches!(engine.run_cycle(t).unwrap(), CycleOutcome::Blocked(_)));

    let blocks = events.kinds().iter().filter(|k| **k == "RISK_BLOCK").count();
    assert_eq!(blocks, 1);

    // next trading day, 09:30 IST
    let next_day = TestUtils::market_open() + Duration::days(1);
    cache.put(TestUtils::wide_gap(next_day));
    assert_eq!(
        engine.run_cycle(next_day).unwrap(),
        CycleOutcome::Entered {
            trade_id: "PAPER-000004".to_string()
        }
    );
    assert_eq!(engine.risk_state().daily_trade_count, 1);
}

#[test]
fn test_loss_disables_trading_for_the_run() {
    let (cache, events, mut engine) = create_engine(TestUtils::create_test_config());
    let t0 = TestUtils::market_open();

    cache.put(TestUtils::wide_gap(t0));
    engine.run_cycle(t0).unwrap();
    let t1 = t0 + Duration::seconds(3);
    cache.put(TestUtils::restored_loss(t1));
    engine.run_cycle(t1).unwrap();

    let state = engine.risk_state();
    assert!(!state.trading_enabled);
    assert_eq!(state.disabled_reason.as_deref(), Some("loss-triggered disable"));

    for i in 2..6 {
        let t = t0 + Duration::seconds(3 * i);
        cache.put(TestUtils::wide_gap(t));
        assert!(matches!(
            engine.run_cycle(t).unwrap(),
            CycleOutcome::Blocked(RiskBlockReason::TradingDisabled { .. })
        ));
    }

    // a new day does not re-enable trading
    let tomorrow = t0 + Duration::days(1);
    cache.put(TestUtils::wide_gap(tomorrow));
    assert!(matches!(
        engine.run_cycle(tomorrow).unwrap(),
        CycleOutcome::Blocked(RiskBlockReason::TradingDisabled { .. })
    ));

    let skips: Vec<_> = engine
        .trades()
        .iter()
        .filter(|t| t.status == TradeStatus::DisabledSkip)
        .collect();
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].id, "PAPER-000002");

    let risk_blocks: Vec<_> = events
        .events()
        .into_iter()
        .filter_map(|e| match e.event {
            TradeEvent::RiskBlock(block) => Some(block),
            _ => None,
        })
        .collect();
    assert_eq!(risk_blocks.len(), 1);
    assert_eq!(risk_blocks[0].skip_trade_id.as_deref(), Some("PAPER-000002"));
}

#[test]
fn test_shadow_losses_can_be_exempt() {
    let mut config = TestUtils::create_test_config();
    config.mode = TradingMode::Shadow;
    config.risk.shadow_losses_disable = false;
    let (cache, _, mut engine) = create_engine(config);
    let t0 = TestUtils::market_open();

    cache.put(TestUtils::create_snapshot(dec!(185.50), dec!(172.10), dec!(22050), t0, PriceSource::Live));
    assert_eq!(
        engine.run_cycle(t0).unwrap(),
        CycleOutcome::Entered {
            trade_id: "SHADOW-000001".to_string()
        }
    );

    let t1 = t0 + Duration::seconds(3);
    cache.put(TestUtils::create_snapshot(dec!(150), dec!(145), dec!(22000), t1, PriceSource::Live));
    engine.run_cycle(t1).unwrap();

    assert_eq!(engine.trades()[0].status, TradeStatus::ShadowClosed);
    assert_eq!(engine.trades()[0].realized_pnl, Some(dec!(-6.6)));
    assert!(engine.risk_state().trading_enabled);
}

#[test]
fn test_margin_ceiling_blocks_entry() {
    let mut config = TestUtils::create_test_config();
    config.risk.max_capital_per_trade = dec!(0.5);
    config.risk.max_margin_usage = dec!(0.4);
    let (cache, events, mut engine) = create_engine(config);
    let t0 = TestUtils::market_open();

    cache.put(TestUtils::wide_gap(t0));
    match engine.run_cycle(t0).unwrap() {
        CycleOutcome::Blocked(RiskBlockReason::MarginCeiling { projected_usage, ceiling }) => {
            assert_eq!(projected_usage, dec!(0.5));
            assert_eq!(ceiling, dec!(0.4));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(engine.trades().is_empty());
    assert_eq!(events.kinds(), vec!["RISK_BLOCK"]);
}
