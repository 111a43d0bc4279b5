//! Synthetic index quotes for PAPER mode

use crate::{
    config::SimulationConfig,
    connectors::traits::{MarketDataProvider, OptionQuotes},
    data::{decimal_from_f64, PriceSource},
    ArbitrageError, Result,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::distribution::Normal;
use tracing::debug;

const SPOT_RANGE: f64 = 50.0;
const FUTURES_PREMIUM_STD: f64 = 5.0;
const VOLATILITY: f64 = 0.15;
const DAYS_TO_EXPIRY: f64 = 7.0;
const WIDE_NOISE_PROBABILITY: f64 = 0.25;
const WIDE_NOISE: f64 = 45.0;
const NARROW_NOISE: f64 = 15.0;
const MIN_PREMIUM: f64 = 1.0;

/// Quote generator scattered around a base spot.
///
/// Option premiums are intrinsic value plus a rough time value plus noise.
/// A quarter of the draws use a wide noise band so that parity gaps above the
/// entry threshold show up regularly.
pub struct SimulatedProvider {
    base_spot: f64,
    rng: Mutex<StdRng>,
    futures_premium: Normal,
    last_spot: Mutex<Option<f64>>,
}

impl SimulatedProvider {
    /// Create a generator; a seed makes the sequence reproducible
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let base_spot = config
            .base_spot
            .to_f64()
            .ok_or_else(|| ArbitrageError::Config(format!("base_spot {} is not representable", config.base_spot)))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let futures_premium = Normal::new(0.0, FUTURES_PREMIUM_STD)
            .map_err(|e| ArbitrageError::Config(format!("Invalid futures premium distribution: {}", e)))?;

        Ok(Self {
            base_spot,
            rng: Mutex::new(rng),
            futures_premium,
            last_spot: Mutex::new(None),
        })
    }

    fn current_spot(&self) -> f64 {
        (*self.last_spot.lock()).unwrap_or(self.base_spot)
    }

    fn option_premium(&self, spot: f64, strike: f64, is_call: bool) -> f64 {
        let intrinsic = if is_call {
            (spot - strike).max(0.0)
        } else {
            (strike - spot).max(0.0)
        };
        let time_value = spot * VOLATILITY * (DAYS_TO_EXPIRY / 365.0).sqrt() * 0.4;

        let mut rng = self.rng.lock();
        let band = if rng.gen_bool(WIDE_NOISE_PROBABILITY) {
            WIDE_NOISE
        } else {
            NARROW_NOISE
        };
        let noise = rng.gen_range(-band..=band);

        (intrinsic + time_value + noise).max(MIN_PREMIUM)
    }
}

#[async_trait]
impl MarketDataProvider for SimulatedProvider {
    async fn connect(&self) -> Result<()> {
        debug!(base_spot = self.base_spot, "Simulated provider ready");
        Ok(())
    }

    async fn get_spot(&self) -> Result<Decimal> {
        let spot = self.base_spot + self.rng.lock().gen_range(-SPOT_RANGE..=SPOT_RANGE);
        *self.last_spot.lock() = Some(spot);
        decimal_from_f64(spot, "spot").map_err(Into::into)
    }

    async fn get_futures(&self) -> Result<Decimal> {
        let premium = self.rng.lock().sample(&self.futures_premium);
        decimal_from_f64(self.current_spot() + premium, "futures").map_err(Into::into)
    }

    async fn get_atm_options(&self, strike: Decimal) -> Result<OptionQuotes> {
        let strike = strike
            .to_f64()
            .ok_or_else(|| ArbitrageError::InvalidPrice(format!("strike {} is not representable", strike)))?;
        let spot = self.current_spot();

        Ok(OptionQuotes {
            call: decimal_from_f64(self.option_premium(spot, strike, true), "call")?,
            put: decimal_from_f64(self.option_premium(spot, strike, false), "put")?,
        })
    }

    fn source(&self) -> PriceSource {
        PriceSource::Simulated
    }

    fn name(&self) -> String {
        "simulated".to_string()
    }
}
