//! Normalized price snapshot and parity arithmetic

use crate::config::SanityConfig;
use crate::ArbitrageError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a snapshot's prices came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    /// Broker-fed market prices
    Live,
    /// Synthetic generator
    Simulated,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Live => write!(f, "LIVE"),
            PriceSource::Simulated => write!(f, "SIMULATED"),
        }
    }
}

/// One observation of the underlying, its futures and the ATM option pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Index spot
    pub spot: Decimal,
    /// Nearest-expiry futures
    pub futures: Decimal,
    /// At-the-money strike
    pub strike: Decimal,
    /// ATM call premium
    pub call_price: Decimal,
    /// ATM put premium
    pub put_price: Decimal,
    /// Observation time
    pub observed_at: DateTime<Utc>,
    /// Price origin
    pub source: PriceSource,
}

impl PriceSnapshot {
    /// Create a snapshot. Validity is checked where snapshots are accepted.
    pub fn new(
        spot: Decimal,
        futures: Decimal,
        strike: Decimal,
        call_price: Decimal,
        put_price: Decimal,
        observed_at: DateTime<Utc>,
        source: PriceSource,
    ) -> Self {
        Self {
            spot,
            futures,
            strike,
            call_price,
            put_price,
            observed_at,
            source,
        }
    }

    /// |(call - put) - (futures - strike)|
    pub fn parity_gap(&self) -> Decimal {
        parity_gap(self.call_price, self.put_price, self.futures, self.strike)
    }

    /// Absolute call/put premium difference
    pub fn call_put_gap(&self) -> Decimal {
        (self.call_price - self.put_price).abs()
    }

    /// Age of the observation at `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.observed_at
    }

    /// All price fields must be strictly positive
    pub fn validate(&self) -> Result<(), ArbitrageError> {
        let fields = [
            ("spot", self.spot),
            ("futures", self.futures),
            ("strike", self.strike),
            ("call_price", self.call_price),
            ("put_price", self.put_price),
        ];
        for (name, value) in fields {
            if value <= Decimal::ZERO {
                return Err(ArbitrageError::InvalidPrice(format!("{} = {} is not positive", name, value)));
            }
        }
        Ok(())
    }

    /// Reasonableness limits for an index quote
    pub fn sanity_check(&self, limits: &SanityConfig) -> Result<(), ArbitrageError> {
        self.validate()?;

        if self.spot < limits.spot_min || self.spot > limits.spot_max {
            return Err(ArbitrageError::InvalidPrice(format!(
                "spot {} outside [{}, {}]",
                self.spot, limits.spot_min, limits.spot_max
            )));
        }

        let option_cap = self.spot * limits.max_option_to_spot;
        if self.call_price > option_cap || self.put_price > option_cap {
            return Err(ArbitrageError::InvalidPrice(format!(
                "option premium above cap {} (call {}, put {})",
                option_cap, self.call_price, self.put_price
            )));
        }

        let basis = (self.futures - self.spot).abs() / self.spot;
        if basis > limits.max_futures_basis {
            return Err(ArbitrageError::InvalidPrice(format!(
                "futures {} too far from spot {}",
                self.futures, self.spot
            )));
        }

        if (self.strike - self.spot).abs() > limits.max_strike_distance {
            return Err(ArbitrageError::InvalidPrice(format!(
                "strike {} too far from spot {}",
                self.strike, self.spot
            )));
        }

        Ok(())
    }
}

/// Put-call parity gap: |(call - put) - (futures - strike)|
pub fn parity_gap(call: Decimal, put: Decimal, futures: Decimal, strike: Decimal) -> Decimal {
    ((call - put) - (futures - strike)).abs()
}

/// Nearest listed strike to `spot`
pub fn atm_strike(spot: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return spot;
    }
    (spot / step).round() * step
}

/// Convert a wire float, rejecting NaN and infinities
pub fn decimal_from_f64(value: f64, field: &str) -> Result<Decimal, ArbitrageError> {
    if !value.is_finite() {
        return Err(ArbitrageError::InvalidPrice(format!("{} is not finite", field)));
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or_else(|| ArbitrageError::InvalidPrice(format!("{} = {} is not representable", field, value)))
}
