//! Market data types and the shared price cache

pub mod cache;
pub mod snapshot;

pub use cache::{CacheStats, PriceCache, PutOutcome};
pub use snapshot::{atm_strike, decimal_from_f64, parity_gap, PriceSnapshot, PriceSource};
