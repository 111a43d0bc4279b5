//! Polling ingestion feed built on a market data provider

use crate::{
    config::{ArbitrageConfig, SanityConfig},
    connectors::{
        traits::{MarketDataProvider, PriceFeed, SnapshotCallback},
        ConnectionStatus,
    },
    data::{atm_strike, PriceSnapshot},
    utils::metrics,
    Result,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

struct FeedInner<P: ?Sized> {
    provider: Arc<P>,
    strike_step: Decimal,
    sanity: SanityConfig,
    status: RwLock<ConnectionStatus>,
    callbacks: RwLock<Vec<SnapshotCallback>>,
}

/// Polls a provider on a fixed interval and pushes normalized snapshots to
/// every registered callback.
pub struct PollingPriceFeed<P: ?Sized> {
    inner: Arc<FeedInner<P>>,
    poll_interval: Duration,
    worker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl<P> PollingPriceFeed<P>
where
    P: MarketDataProvider + ?Sized + 'static,
{
    /// Create a disconnected feed
    pub fn new(provider: Arc<P>, config: &ArbitrageConfig) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                provider,
                strike_step: config.contract.strike_step,
                sanity: config.market_data.sanity.clone(),
                status: RwLock::new(ConnectionStatus::Disconnected),
                callbacks: RwLock::new(Vec::new()),
            }),
            poll_interval: Duration::from_millis(config.market_data.poll_interval_ms),
            worker: Mutex::new(None),
        }
    }

    /// Fetch one snapshot and run the sanity limits on it, without
    /// delivering it anywhere
    pub async fn poll_once(&self) -> Result<PriceSnapshot> {
        let snapshot = self.inner.fetch().await?;
        snapshot.sanity_check(&self.inner.sanity)?;
        Ok(snapshot)
    }

    fn stop_worker(&self) {
        if let Some((stop, handle)) = self.worker.lock().take() {
            let _ = stop.send(true);
            // the loop only awaits between polls, so aborting cannot interrupt a delivery
            handle.abort();
        }
    }
}

impl<P> FeedInner<P>
where
    P: MarketDataProvider + ?Sized + 'static,
{
    async fn fetch(&self) -> Result<PriceSnapshot> {
        let spot = self.provider.get_spot().await?;
        let futures = self.provider.get_futures().await?;
        let strike = atm_strike(spot, self.strike_step);
        let options = self.provider.get_atm_options(strike).await?;

        Ok(PriceSnapshot::new(
            spot,
            futures,
            strike,
            options.call,
            options.put,
            Utc::now(),
            self.provider.source(),
        ))
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.write() = status;
    }

    async fn poll(&self) {
        let snapshot = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if *self.status.read() == ConnectionStatus::Connected {
                    warn!(provider = %self.provider.name(), error = %e, "Quote fetch failed, feed disconnected");
                }
                self.set_status(ConnectionStatus::Error);
                return;
            }
        };
        self.set_status(ConnectionStatus::Connected);

        if let Err(e) = snapshot.sanity_check(&self.sanity) {
            warn!(provider = %self.provider.name(), error = %e, "Dropping implausible snapshot");
            metrics::record_snapshot_rejected("sanity");
            return;
        }

        let callbacks = self.callbacks.read().clone();
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }

    async fn run(self: Arc<Self>, poll_interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll().await,
                _ = stop.changed() => break,
            }
        }
        debug!(provider = %self.provider.name(), "Polling loop stopped");
    }
}

#[async_trait]
impl<P> PriceFeed for PollingPriceFeed<P>
where
    P: MarketDataProvider + ?Sized + 'static,
{
    async fn connect(&self) -> Result<()> {
        info!(provider = %self.inner.provider.name(), "Connecting price feed");
        self.inner.set_status(ConnectionStatus::Connecting);

        if let Err(e) = self.inner.provider.connect().await {
            self.inner.set_status(ConnectionStatus::Error);
            return Err(e);
        }
        self.inner.set_status(ConnectionStatus::Connected);

        let mut worker = self.worker.lock();
        if worker.is_none() {
            let (stop_tx, stop_rx) = watch::channel(false);
            let handle = tokio::spawn(Arc::clone(&self.inner).run(self.poll_interval, stop_rx));
            *worker = Some((stop_tx, handle));
        }

        Ok(())
    }

    fn on_snapshot(&self, callback: SnapshotCallback) {
        self.inner.callbacks.write().push(callback);
    }

    fn is_connected(&self) -> bool {
        self.connection_status() == ConnectionStatus::Connected
    }

    fn connection_status(&self) -> ConnectionStatus {
        *self.inner.status.read()
    }

    async fn reconnect(&self) -> Result<()> {
        info!(provider = %self.inner.provider.name(), "Reconnecting price feed");
        self.stop_worker();
        self.inner.set_status(ConnectionStatus::Reconnecting);
        self.connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop_worker();
        self.inner.set_status(ConnectionStatus::Disconnected);
        info!(provider = %self.inner.provider.name(), "Price feed disconnected");
        Ok(())
    }

    fn name(&self) -> String {
        self.inner.provider.name()
    }
}

impl<P: ?Sized> Drop for PollingPriceFeed<P> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.worker.get_mut().take() {
            handle.abort();
        }
    }
}
