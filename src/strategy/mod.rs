//! Parity arbitrage detection

pub mod detector;

pub use detector::{ArbitrageDetector, ExitDecision, ParityOpportunity, Signal};
