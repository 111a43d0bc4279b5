//! Liveness checks, reconnect escalation and alerting

use super::{ScriptedFeed, TestUtils};
use chrono::{Duration, Utc};
use parity_shadow_arb::{
    monitor::{ConnectionMonitor, MonitorAction},
    trading::{RecordingEventSink, TradeEvent},
    PriceFeed,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_test::assert_ok;

fn create_monitor(feed: Arc<ScriptedFeed>) -> (ConnectionMonitor, Arc<RecordingEventSink>, chrono::DateTime<Utc>) {
    let mut config = TestUtils::create_test_config();
    config.monitoring.reconnect_backoff_base_ms = 1;
    config.monitoring.reconnect_backoff_max_ms = 5;
    let events = Arc::new(RecordingEventSink::new());
    let start = TestUtils::market_open();
    let monitor = ConnectionMonitor::starting_at(&config, feed, events.clone(), start);
    (monitor, events, start)
}

#[tokio::test]
async fn test_silence_escalates_to_single_alert() {
    let feed = Arc::new(ScriptedFeed::new());
    feed.connect().await.unwrap();
    feed.fail_reconnects();
    let (monitor, events, start) = create_monitor(feed.clone());
    let (_tx, mut rx) = watch::channel(false);

    // liveness timeout is 10s x 3 missed intervals
    monitor.liveness().record_success(start);
    let action = assert_ok!(monitor.check(start + Duration::seconds(30), &mut rx).await);
    assert_eq!(action, MonitorAction::Healthy);

    let mut actions = Vec::new();
    for tick in 1..=10 {
        let at = start + Duration::seconds(30 + 30 * tick);
        actions.push(monitor.check(at, &mut rx).await.unwrap());
    }

    // 2 degraded checks, 5 reconnects, one alert, then quiet
    assert!(matches!(actions[0], MonitorAction::Degraded { consecutive_failures: 1 }));
    assert!(matches!(actions[1], MonitorAction::Degraded { consecutive_failures: 2 }));
    for (i, action) in actions[2..7].iter().enumerate() {
        match action {
            MonitorAction::Reconnect { attempt, .. } => assert_eq!(*attempt, i as u32 + 1),
            other => panic!("expected reconnect, got {:?}", other),
        }
    }
    assert_eq!(actions[7], MonitorAction::Alert { attempts: 5 });
    assert_eq!(actions[8], MonitorAction::Alerted);
    assert_eq!(actions[9], MonitorAction::Alerted);

    assert_eq!(feed.reconnect_count(), 5);

    let alerts: Vec<_> = events
        .events()
        .into_iter()
        .filter_map(|e| match e.event {
            TradeEvent::HealthAlert(alert) => Some(alert),
            _ => None,
        })
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].feed, "scripted");
    assert_eq!(alerts[0].reconnect_attempts, 5);
    assert_eq!(alerts[0].last_success_at, Some(start));
}

#[tokio::test]
async fn test_ingestion_recovery_resets_health() {
    let feed = Arc::new(ScriptedFeed::new());
    feed.connect().await.unwrap();
    let (monitor, events, start) = create_monitor(feed.clone());
    let (_tx, mut rx) = watch::channel(false);

    for tick in 1..=4 {
        monitor
            .check(start + Duration::seconds(31 * tick), &mut rx)
            .await
            .unwrap();
    }
    let health = monitor.health();
    assert_eq!(health.consecutive_failures, 4);
    assert_eq!(health.reconnect_attempts, 2);

    // the reconnect succeeded and data flows again
    let recovered = start + Duration::seconds(125);
    monitor.liveness().record_success(recovered);
    let action = monitor
        .check(recovered + Duration::seconds(5), &mut rx)
        .await
        .unwrap();
    assert_eq!(action, MonitorAction::Healthy);

    let health = monitor.health();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.reconnect_attempts, 0);
    assert_eq!(health.last_success_at, Some(recovered));
    assert!(events.kinds().is_empty());
}

#[tokio::test]
async fn test_disconnected_feed_counts_as_failure() {
    let feed = Arc::new(ScriptedFeed::new());
    feed.connect().await.unwrap();
    let (monitor, _, start) = create_monitor(feed.clone());
    let (_tx, mut rx) = watch::channel(false);

    monitor.liveness().record_success(start);
    feed.drop_connection();

    let action = monitor.check(start + Duration::seconds(1), &mut rx).await.unwrap();
    assert_eq!(action, MonitorAction::Degraded { consecutive_failures: 1 });
}

#[tokio::test]
async fn test_shutdown_during_backoff_skips_reconnect() {
    let feed = Arc::new(ScriptedFeed::new());
    feed.connect().await.unwrap();
    let mut config = TestUtils::create_test_config();
    config.monitoring.max_consecutive_failures = 1;
    config.monitoring.reconnect_backoff_base_ms = 60_000;
    config.monitoring.reconnect_backoff_max_ms = 60_000;
    let start = TestUtils::market_open();
    let monitor = ConnectionMonitor::starting_at(&config, feed.clone(), Arc::new(RecordingEventSink::new()), start);

    let (tx, mut rx) = watch::channel(false);
    tx.send(true).unwrap();

    let action = monitor.check(start + Duration::seconds(60), &mut rx).await.unwrap();
    assert!(matches!(action, MonitorAction::Reconnect { attempt: 1, .. }));
    assert_eq!(feed.reconnect_count(), 0);
}
