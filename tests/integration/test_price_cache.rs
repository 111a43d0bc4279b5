//! Price cache under concurrent writers and readers

use super::TestUtils;
use chrono::{Duration, Utc};
use parity_shadow_arb::{
    data::{PriceCache, PriceSource, PutOutcome},
    ArbitrageError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_never_tear_reads() {
    let cache = Arc::new(PriceCache::new(Duration::seconds(300)));
    let base = Utc::now();

    let mut writers = Vec::new();
    for writer in 0..4i64 {
        let cache = Arc::clone(&cache);
        writers.push(tokio::spawn(async move {
            for i in 0..250i64 {
                let step = Decimal::from(writer * 1000 + i);
                // every written snapshot keeps call - put == 10
                let snapshot = TestUtils::create_snapshot(
                    dec!(150) + step,
                    dec!(140) + step,
                    dec!(22050),
                    base + Duration::milliseconds(i * 4 + writer),
                    PriceSource::Simulated,
                );
                cache.put(snapshot);
                tokio::task::yield_now().await;
            }
        }));
    }

    let reader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let mut seen = 0;
            let mut last = None;
            for _ in 0..2000 {
                if let Some(snapshot) = cache.latest() {
                    assert_eq!(snapshot.call_price - snapshot.put_price, dec!(10));
                    if let Some(previous) = last {
                        assert!(snapshot.observed_at >= previous);
                    }
                    last = Some(snapshot.observed_at);
                    seen += 1;
                }
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.accepted + stats.rejected_out_of_order, 1000);
    assert_eq!(stats.rejected_invalid, 0);
    // the newest timestamp written is always the one left
    assert_eq!(
        cache.latest().unwrap().observed_at,
        base + Duration::milliseconds(249 * 4 + 3)
    );
}

#[test]
fn test_invalid_and_out_of_order_snapshots() {
    let cache = PriceCache::new(Duration::seconds(300));
    let now = Utc::now();

    assert!(cache.put(TestUtils::wide_gap(now)).is_accepted());

    let bad = TestUtils::create_snapshot(dec!(0), dec!(172.10), dec!(22050), now, PriceSource::Simulated);
    assert!(matches!(cache.put(bad), PutOutcome::Invalid(_)));

    let older = TestUtils::wide_gap(now - Duration::seconds(1));
    assert!(matches!(cache.put(older), PutOutcome::OutOfOrder { .. }));

    let stats = cache.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected_invalid, 1);
    assert_eq!(stats.rejected_out_of_order, 1);
    assert_eq!(cache.latest().unwrap().observed_at, now);
}

#[test]
fn test_freshness_window() {
    let cache = PriceCache::new(Duration::seconds(300));
    let t0 = Utc::now();

    match cache.fresh_at(t0) {
        Err(ArbitrageError::StaleData(_)) => {}
        other => panic!("expected stale data, got {:?}", other),
    }

    cache.put(TestUtils::wide_gap(t0));
    assert!(cache.get_at(t0 + Duration::seconds(300)).is_some());
    assert!(cache.get_at(t0 + Duration::seconds(301)).is_none());
    assert!(matches!(
        cache.fresh_at(t0 + Duration::seconds(301)),
        Err(ArbitrageError::StaleData(_))
    ));
    // the expired snapshot is kept, only hidden from fresh reads
    assert!(cache.latest().is_some());
}
