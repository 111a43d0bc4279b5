//! Task wiring for a shadow trading session

use crate::{
    config::ArbitrageConfig,
    connectors::{PriceFeed, ProviderFactory},
    data::{PriceCache, PriceSnapshot, PutOutcome},
    monitor::ConnectionMonitor,
    trading::{
        ChannelEventSink, DecisionEngine, EventEnvelope, EventSink, LogEventSink, SessionSummary, StatusSnapshot,
        TradingCalendar,
    },
    ArbitrageError, Result,
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// A complete session: feed, cache, monitor, decision loop and event writer.
///
/// The feed pushes into the cache and the liveness handle; the monitor and
/// the decision loop run as separate tasks; events from both are serialized
/// by a single writer task in emission order.
pub struct ShadowTradingSystem {
    config: Arc<ArbitrageConfig>,
    feed: Arc<dyn PriceFeed>,
    cache: Arc<PriceCache>,
    monitor: Arc<ConnectionMonitor>,
    engine: DecisionEngine,
    event_rx: mpsc::UnboundedReceiver<EventEnvelope>,
    observers: Vec<Arc<dyn EventSink>>,
}

impl ShadowTradingSystem {
    /// Validate `config` and build a session on the provider it selects
    pub fn new(config: ArbitrageConfig) -> Result<Self> {
        config.validate()?;
        let feed = ProviderFactory::create_feed(&config)?;
        Self::with_feed(config, feed)
    }

    /// Build a session on an existing feed
    pub fn with_feed(config: ArbitrageConfig, feed: Arc<dyn PriceFeed>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let cache = Arc::new(PriceCache::new(config.staleness_limit()));

        let (sink, event_rx) = ChannelEventSink::channel();
        let sink: Arc<dyn EventSink> = Arc::new(sink);

        let monitor = Arc::new(ConnectionMonitor::new(&config, Arc::clone(&feed), Arc::clone(&sink)));
        let engine = DecisionEngine::new(Arc::clone(&config), Arc::clone(&cache), sink)?;

        Ok(Self {
            config,
            feed,
            cache,
            monitor,
            engine,
            event_rx,
            observers: Vec::new(),
        })
    }

    /// Replace the decision loop's trading calendar
    pub fn with_calendar(mut self, calendar: Box<dyn TradingCalendar>) -> Self {
        self.engine = self.engine.with_calendar(calendar);
        self
    }

    /// Also deliver every trade event to `sink`
    pub fn add_event_observer(&mut self, sink: Arc<dyn EventSink>) {
        self.observers.push(sink);
    }

    /// Status updates published after each decision cycle
    pub fn status_receiver(&self) -> watch::Receiver<StatusSnapshot> {
        self.engine.subscribe_status()
    }

    /// Shared price cache
    pub fn cache(&self) -> Arc<PriceCache> {
        Arc::clone(&self.cache)
    }

    /// Run until `shutdown` resolves or the decision loop halts.
    ///
    /// Open trades are not force-closed; they appear as open in the
    /// returned summary.
    pub async fn run_until<F>(self, shutdown: F) -> Result<SessionSummary>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            feed,
            cache,
            monitor,
            engine,
            mut event_rx,
            observers,
        } = self;

        info!(
            mode = %config.mode,
            underlying = %config.contract.underlying,
            feed = %feed.name(),
            "Starting shadow trading session"
        );

        let liveness = monitor.liveness();
        let ingest_cache = Arc::clone(&cache);
        feed.on_snapshot(Arc::new(move |snapshot: PriceSnapshot| {
            let observed_at = snapshot.observed_at;
            match ingest_cache.put(snapshot) {
                PutOutcome::Accepted => {}
                PutOutcome::OutOfOrder { cached_at, offered_at } => {
                    warn!(%cached_at, %offered_at, "Dropped out-of-order snapshot");
                }
                PutOutcome::Invalid(reason) => {
                    warn!(%observed_at, reason = %reason, "Dropped invalid snapshot");
                }
            }
            liveness.record_success(Utc::now());
        }));

        // a failed first connect is left to the monitor's reconnects
        if let Err(e) = feed.connect().await {
            warn!(feed = %feed.name(), "Initial connect failed: {}", e);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let writer = tokio::spawn(async move {
            let log_sink = LogEventSink;
            while let Some(envelope) = event_rx.recv().await {
                for observer in &observers {
                    observer.deliver(envelope.clone());
                }
                log_sink.deliver(envelope);
            }
        });

        let monitor_task = tokio::spawn(Arc::clone(&monitor).run(shutdown_rx.clone()));
        drop(monitor);
        let mut engine_task = tokio::spawn(engine.run(shutdown_rx));

        tokio::pin!(shutdown);
        let engine_result = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
                (&mut engine_task).await
            }
            result = &mut engine_task => {
                warn!("Decision loop exited before shutdown was requested");
                let _ = shutdown_tx.send(true);
                result
            }
        };

        match monitor_task.await {
            Ok(Err(e)) => error!("Connection monitor failed: {}", e),
            Err(e) => error!("Connection monitor task panicked: {}", e),
            Ok(Ok(())) => {}
        }

        if let Err(e) = feed.disconnect().await {
            warn!(feed = %feed.name(), "Disconnect failed: {}", e);
        }

        // every sender is gone once both tasks have finished
        if let Err(e) = writer.await {
            error!("Event writer task panicked: {}", e);
        }

        let stats = cache.stats();
        info!(
            accepted = stats.accepted,
            rejected_invalid = stats.rejected_invalid,
            rejected_out_of_order = stats.rejected_out_of_order,
            "Session finished"
        );

        engine_result.map_err(|e| ArbitrageError::Trading(format!("decision loop task failed: {}", e)))?
    }
}
