//! Market data providers and the ingestion feed

pub mod broker;
pub mod feed;
pub mod simulated;
pub mod traits;

pub use broker::BrokerQuoteProvider;
pub use feed::PollingPriceFeed;
pub use simulated::SimulatedProvider;
pub use traits::*;

use crate::config::{ArbitrageConfig, TradingMode};
use crate::{ArbitrageError, Result};
use std::fmt;
use std::sync::Arc;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Disconnected
    Disconnected,
    /// Connecting
    Connecting,
    /// Connected
    Connected,
    /// Reconnecting
    Reconnecting,
    /// Error state
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Provider factory selecting the quote source for a mode
pub struct ProviderFactory;

impl ProviderFactory {
    /// PAPER uses the simulator, SHADOW the broker quote API
    pub fn create_provider(config: &ArbitrageConfig) -> Result<Arc<dyn MarketDataProvider>> {
        match config.mode {
            TradingMode::Paper => Ok(Arc::new(SimulatedProvider::new(&config.simulation)?)),
            TradingMode::Shadow => {
                let broker = config.broker.as_ref().ok_or_else(|| {
                    ArbitrageError::Config("SHADOW mode requires a [broker] section".to_string())
                })?;
                Ok(Arc::new(BrokerQuoteProvider::new(broker, &config.contract.underlying)?))
            }
        }
    }

    /// Provider wrapped in a polling feed
    pub fn create_feed(config: &ArbitrageConfig) -> Result<Arc<PollingPriceFeed<dyn MarketDataProvider>>> {
        let provider = Self::create_provider(config)?;
        Ok(Arc::new(PollingPriceFeed::new(provider, config)))
    }
}
