//! Market data capability traits and common types

use crate::{data::PriceSnapshot, data::PriceSource, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// ATM call and put premiums for one strike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionQuotes {
    /// Call premium
    pub call: Decimal,
    /// Put premium
    pub put: Decimal,
}

/// Read-only quote capability implemented once per price source.
///
/// Implementations only fetch prices. There is no order, balance or account
/// method and none may be added.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Prepare the provider (authenticate, warm up a session)
    async fn connect(&self) -> Result<()>;

    /// Latest index spot
    async fn get_spot(&self) -> Result<Decimal>;

    /// Latest nearest-expiry futures price
    async fn get_futures(&self) -> Result<Decimal>;

    /// Latest call and put premiums at `strike`
    async fn get_atm_options(&self, strike: Decimal) -> Result<OptionQuotes>;

    /// Origin tag stamped on snapshots built from this provider
    fn source(&self) -> PriceSource;

    /// Provider display name
    fn name(&self) -> String;
}

/// Callback receiving every snapshot a feed produces
pub type SnapshotCallback = Arc<dyn Fn(PriceSnapshot) + Send + Sync>;

/// Ingestion collaborator contract
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Start producing snapshots
    async fn connect(&self) -> Result<()>;

    /// Register a snapshot consumer
    fn on_snapshot(&self, callback: SnapshotCallback);

    /// Whether the last fetch succeeded
    fn is_connected(&self) -> bool;

    /// Current connection status
    fn connection_status(&self) -> super::ConnectionStatus;

    /// Tear down and restart ingestion
    async fn reconnect(&self) -> Result<()>;

    /// Stop producing snapshots
    async fn disconnect(&self) -> Result<()>;

    /// Feed display name
    fn name(&self) -> String;
}
