//! Parity Shadow Arbitrage
//!
//! Watches live index derivative quotes for put-call parity violations and
//! manages simulated ("shadow") arbitrage positions from detection to exit.
//! Nothing in this crate can place an order: every outcome is computed from
//! observed prices only.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectors;
pub mod data;
pub mod monitor;
pub mod runtime;
pub mod strategy;
pub mod trading;
pub mod utils;

// Re-export commonly used types
pub use config::{ArbitrageConfig, TradingMode};
pub use connectors::{MarketDataProvider, PriceFeed};
pub use data::{PriceCache, PriceSnapshot, PriceSource};
pub use monitor::ConnectionMonitor;
pub use runtime::ShadowTradingSystem;
pub use strategy::{ArbitrageDetector, Signal};
pub use trading::{DecisionEngine, RiskManager, Trade, TradeStateMachine};

/// Result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Common error types for the arbitrage system
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ArbitrageError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A safety invariant was broken; the process must not keep running
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// No snapshot inside the freshness window
    #[error("Stale data: {0}")]
    StaleData(String),

    /// Non-positive or otherwise unusable price field
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Reconnection ceiling exhausted
    #[error("Health alert: {0}")]
    HealthAlert(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    DataParsing(String),

    /// Trading error
    #[error("Trading error: {0}")]
    Trading(String),

    /// Risk management error
    #[error("Risk management error: {0}")]
    RiskManagement(String),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),
}

impl ArbitrageError {
    /// Whether this error must stop the process instead of skipping a cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArbitrageError::InvariantViolation(_))
    }
}

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
