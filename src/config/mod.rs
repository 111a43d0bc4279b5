//! Configuration management module

pub mod settings;

pub use settings::*;

use crate::{ArbitrageError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Simulation mode. There is deliberately no live-trading variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TradingMode {
    /// Synthetic prices, simulated fills
    Paper,
    /// Live broker prices, hypothetical fills only
    Shadow,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Paper => write!(f, "PAPER"),
            TradingMode::Shadow => write!(f, "SHADOW"),
        }
    }
}

impl FromStr for TradingMode {
    type Err = ArbitrageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PAPER" => Ok(TradingMode::Paper),
            "SHADOW" => Ok(TradingMode::Shadow),
            other => Err(ArbitrageError::InvariantViolation(format!(
                "mode '{}' is not a simulation mode (expected PAPER or SHADOW)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for TradingMode {
    type Error = ArbitrageError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradingMode> for String {
    fn from(mode: TradingMode) -> Self {
        mode.to_string()
    }
}

/// Main configuration structure for the arbitrage system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageConfig {
    /// Simulation mode
    pub mode: TradingMode,
    /// Traded contract
    pub contract: ContractConfig,
    /// Strategy configuration
    pub strategy: StrategyConfig,
    /// Risk management configuration
    pub risk: RiskConfig,
    /// Market data configuration
    pub market_data: MarketDataConfig,
    /// Connection monitoring configuration
    pub monitoring: MonitoringConfig,
    /// Decision loop configuration
    pub execution: ExecutionConfig,
    /// Synthetic price generator (PAPER mode)
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Read-only broker quotes (SHADOW mode)
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}

/// Contract specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Underlying index symbol
    pub underlying: String,
    /// Units per contract; fixed for the whole run
    pub lot_size: u32,
    /// Distance between listed strikes
    pub strike_step: Decimal,
}

/// Strategy-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Parity gap above which an entry is signalled
    pub min_parity_gap: Decimal,
    /// Parity gap below which an open trade is exited
    pub exit_threshold: Decimal,
    /// Maximum holding time in seconds
    pub max_hold_secs: u64,
    /// Cost charged per leg
    pub transaction_cost_per_leg: Decimal,
    /// Legs per trade counted for costs
    pub legs_per_trade: u32,
    /// Realized profit below this is flagged marginal
    pub min_profit_threshold: Decimal,
}

/// Risk management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Simulated starting capital
    pub initial_capital: Decimal,
    /// Fraction of available capital committed per trade
    pub max_capital_per_trade: Decimal,
    /// Margin utilization ceiling
    pub max_margin_usage: Decimal,
    /// Maximum simultaneously open trades
    pub max_open_trades: u32,
    /// Maximum entries per trading day
    pub max_trades_per_day: u32,
    /// Stop trading for the rest of the run after a losing trade
    pub disable_after_loss: bool,
    /// Whether losses on shadow (live-priced) trades count towards disablement
    pub shadow_losses_disable: bool,
}

/// Market data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Maximum snapshot age in seconds
    pub staleness_limit_secs: u64,
    /// Provider polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Reasonableness limits applied by the feed
    pub sanity: SanityConfig,
}

/// Reasonableness limits for incoming snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    /// Lowest plausible spot
    pub spot_min: Decimal,
    /// Highest plausible spot
    pub spot_max: Decimal,
    /// Option price cap as a fraction of spot
    pub max_option_to_spot: Decimal,
    /// Maximum |futures - spot| / spot
    pub max_futures_basis: Decimal,
    /// Maximum |strike - spot|
    pub max_strike_distance: Decimal,
}

/// Connection monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Health check interval in seconds
    pub health_check_interval_secs: u64,
    /// Expected maximum gap between ingestion events in seconds
    pub liveness_timeout_secs: u64,
    /// Number of missed intervals tolerated before a check fails
    pub missed_interval_tolerance: u32,
    /// Consecutive failed checks before reconnecting
    pub max_consecutive_failures: u32,
    /// Reconnect attempts before raising a health alert
    pub max_reconnect_attempts: u32,
    /// First reconnect backoff in milliseconds
    pub reconnect_backoff_base_ms: u64,
    /// Backoff ceiling in milliseconds
    pub reconnect_backoff_max_ms: u64,
    /// Enable the Prometheus exporter
    pub enable_metrics: bool,
    /// Exporter listen address
    #[serde(default)]
    pub metrics_listen_addr: Option<String>,
}

/// Decision loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Decision cycle interval in seconds
    pub decision_interval_secs: u64,
    /// Status line interval in seconds
    pub status_interval_secs: u64,
    /// Trading calendar offset from UTC in minutes
    pub calendar_utc_offset_minutes: i32,
}

/// Synthetic price generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Centre of the simulated spot distribution
    pub base_spot: Decimal,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_spot: dec!(22000),
            seed: None,
        }
    }
}

/// Read-only broker quote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker display name
    pub name: String,
    /// REST API base URL
    pub base_url: String,
    /// API key, `${VAR}` references are expanded
    pub api_key: String,
    /// API secret, `${VAR}` references are expanded
    pub api_secret: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Spot quote endpoint
    #[serde(default = "default_spot_endpoint")]
    pub spot_endpoint: String,
    /// Futures quote endpoint
    #[serde(default = "default_futures_endpoint")]
    pub futures_endpoint: String,
    /// Option chain quote endpoint
    #[serde(default = "default_options_endpoint")]
    pub options_endpoint: String,
}

fn default_spot_endpoint() -> String {
    "/market/quote".to_string()
}

fn default_futures_endpoint() -> String {
    "/market/futures/quote".to_string()
}

fn default_options_endpoint() -> String {
    "/market/options/quote".to_string()
}

impl ArbitrageConfig {
    /// Load configuration from a TOML file, with `PARITY__SECTION__KEY`
    /// environment overrides layered on top
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArbitrageError::Config(format!(
                "Failed to read config file: {} does not exist",
                path.display()
            ))
            .into());
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix("PARITY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ArbitrageError::Config(format!("Failed to read config: {}", e)))?;

        let mut config: ArbitrageConfig = settings
            .try_deserialize()
            .map_err(|e| ArbitrageError::Config(format!("Failed to parse config: {}", e)))?;

        config.expand_env_vars()?;

        Ok(config)
    }

    /// Validate the configuration. Safety invariants fail with
    /// `InvariantViolation`, everything else with `Config`.
    pub fn validate(&self) -> Result<()> {
        if self.contract.lot_size == 0 {
            return Err(ArbitrageError::InvariantViolation("lot size must be positive".to_string()).into());
        }
        if self.contract.lot_size != ConfigDefaults::LOT_SIZE {
            return Err(ArbitrageError::InvariantViolation(format!(
                "lot size {} does not match the {} contract size {}",
                self.contract.lot_size,
                self.contract.underlying,
                ConfigDefaults::LOT_SIZE
            ))
            .into());
        }
        ConfigValidator::validate_symbol(&self.contract.underlying)?;
        ConfigValidator::validate_positive(self.contract.strike_step, "strike_step")?;

        let s = &self.strategy;
        ConfigValidator::validate_positive(s.min_parity_gap, "min_parity_gap")?;
        ConfigValidator::validate_positive(s.exit_threshold, "exit_threshold")?;
        ConfigValidator::validate_non_negative(s.transaction_cost_per_leg, "transaction_cost_per_leg")?;
        ConfigValidator::validate_non_negative(s.min_profit_threshold, "min_profit_threshold")?;
        if s.exit_threshold >= s.min_parity_gap {
            return Err(ArbitrageError::Config(
                "exit_threshold must be below min_parity_gap".to_string(),
            )
            .into());
        }
        if s.legs_per_trade == 0 {
            return Err(ArbitrageError::Config("legs_per_trade must be positive".to_string()).into());
        }
        if s.max_hold_secs == 0 {
            return Err(ArbitrageError::Config("max_hold_secs must be positive".to_string()).into());
        }
        if s.min_parity_gap < self.transaction_costs() + s.min_profit_threshold {
            return Err(ArbitrageError::Config(format!(
                "min_parity_gap {} cannot cover transaction costs {} plus min profit {}",
                s.min_parity_gap,
                self.transaction_costs(),
                s.min_profit_threshold
            ))
            .into());
        }

        let r = &self.risk;
        ConfigValidator::validate_positive(r.initial_capital, "initial_capital")?;
        ConfigValidator::validate_fraction(r.max_capital_per_trade, "max_capital_per_trade")?;
        ConfigValidator::validate_fraction(r.max_margin_usage, "max_margin_usage")?;
        if r.max_open_trades != 1 {
            return Err(ArbitrageError::Config(
                "max_open_trades must be 1: only one parity position is held at a time".to_string(),
            )
            .into());
        }

        let m = &self.market_data;
        if m.staleness_limit_secs == 0 || m.poll_interval_ms == 0 {
            return Err(ArbitrageError::Config(
                "staleness_limit_secs and poll_interval_ms must be positive".to_string(),
            )
            .into());
        }
        if m.sanity.spot_min >= m.sanity.spot_max {
            return Err(ArbitrageError::Config("sanity.spot_min must be below spot_max".to_string()).into());
        }

        let mon = &self.monitoring;
        if mon.health_check_interval_secs == 0 || mon.liveness_timeout_secs == 0 {
            return Err(ArbitrageError::Config(
                "health check interval and liveness timeout must be positive".to_string(),
            )
            .into());
        }
        if mon.max_consecutive_failures == 0 || mon.max_reconnect_attempts == 0 {
            return Err(ArbitrageError::Config(
                "failure ceiling and reconnect attempts must be positive".to_string(),
            )
            .into());
        }
        if mon.reconnect_backoff_base_ms > mon.reconnect_backoff_max_ms {
            return Err(ArbitrageError::Config(
                "reconnect_backoff_base_ms exceeds reconnect_backoff_max_ms".to_string(),
            )
            .into());
        }

        if self.execution.decision_interval_secs == 0 {
            return Err(ArbitrageError::Config("decision_interval_secs must be positive".to_string()).into());
        }

        let liveness_window = mon
            .liveness_timeout_secs
            .checked_mul(u64::from(mon.missed_interval_tolerance.max(1)))
            .unwrap_or(u64::MAX);
        for (secs, field) in [
            (s.max_hold_secs, "max_hold_secs"),
            (m.staleness_limit_secs, "staleness_limit_secs"),
            (mon.health_check_interval_secs, "health_check_interval_secs"),
            (liveness_window, "liveness_timeout_secs x missed_interval_tolerance"),
            (self.execution.decision_interval_secs, "decision_interval_secs"),
            (self.execution.status_interval_secs, "status_interval_secs"),
        ] {
            ConfigValidator::validate_max_secs(secs, field)?;
        }

        if self.mode == TradingMode::Shadow {
            let broker = self.broker.as_ref().ok_or_else(|| {
                ArbitrageError::Config("SHADOW mode requires a [broker] section".to_string())
            })?;
            ConfigValidator::validate_url(&broker.base_url, "broker.base_url")?;
        }

        Ok(())
    }

    /// Total transaction costs of one trade
    pub fn transaction_costs(&self) -> Decimal {
        self.strategy.transaction_cost_per_leg * Decimal::from(self.strategy.legs_per_trade)
    }

    /// Maximum holding time
    pub fn max_hold(&self) -> chrono::Duration {
        seconds(self.strategy.max_hold_secs)
    }

    /// Snapshot staleness limit
    pub fn staleness_limit(&self) -> chrono::Duration {
        seconds(self.market_data.staleness_limit_secs)
    }

    /// Time without ingestion after which a health check fails
    pub fn liveness_timeout(&self) -> chrono::Duration {
        let tolerance = u64::from(self.monitoring.missed_interval_tolerance.max(1));
        seconds(
            self.monitoring
                .liveness_timeout_secs
                .checked_mul(tolerance)
                .unwrap_or(u64::MAX),
        )
    }

    /// Interval between status log lines
    pub fn status_interval(&self) -> chrono::Duration {
        seconds(self.execution.status_interval_secs)
    }

    /// Decision cycle interval
    pub fn decision_interval(&self) -> Duration {
        Duration::from_secs(self.execution.decision_interval_secs)
    }

    /// Expand environment variables in broker credentials
    fn expand_env_vars(&mut self) -> Result<()> {
        if let Some(broker) = self.broker.as_mut() {
            broker.api_key = EnvExpander::expand(&broker.api_key)?;
            broker.api_secret = EnvExpander::expand(&broker.api_secret)?;
            broker.base_url = EnvExpander::expand(&broker.base_url)?;
        }
        Ok(())
    }
}

/// Seconds as a chrono duration, saturating instead of wrapping or panicking
fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            mode: TradingMode::Paper,
            contract: ContractConfig {
                underlying: "NIFTY".to_string(),
                lot_size: ConfigDefaults::LOT_SIZE,
                strike_step: dec!(50),
            },
            strategy: StrategyConfig {
                min_parity_gap: dec!(17.0),
                exit_threshold: dec!(10.0),
                max_hold_secs: 300,
                transaction_cost_per_leg: dec!(5.0),
                legs_per_trade: 3,
                min_profit_threshold: dec!(2.0),
            },
            risk: RiskConfig {
                initial_capital: dec!(10000.0),
                max_capital_per_trade: dec!(0.10),
                max_margin_usage: dec!(0.80),
                max_open_trades: 1,
                max_trades_per_day: 3,
                disable_after_loss: true,
                shadow_losses_disable: true,
            },
            market_data: MarketDataConfig {
                staleness_limit_secs: 300,
                poll_interval_ms: 1000,
                sanity: SanityConfig {
                    spot_min: dec!(15000),
                    spot_max: dec!(30000),
                    max_option_to_spot: dec!(0.15),
                    max_futures_basis: dec!(0.10),
                    max_strike_distance: dec!(200),
                },
            },
            monitoring: MonitoringConfig {
                health_check_interval_secs: ConfigDefaults::HEALTH_CHECK_INTERVAL_SECS,
                liveness_timeout_secs: ConfigDefaults::LIVENESS_TIMEOUT_SECS,
                missed_interval_tolerance: 3,
                max_consecutive_failures: 3,
                max_reconnect_attempts: ConfigDefaults::MAX_RECONNECT_ATTEMPTS,
                reconnect_backoff_base_ms: 1000,
                reconnect_backoff_max_ms: 30_000,
                enable_metrics: false,
                metrics_listen_addr: None,
            },
            execution: ExecutionConfig {
                decision_interval_secs: 3,
                status_interval_secs: 30,
                calendar_utc_offset_minutes: 330,
            },
            simulation: SimulationConfig::default(),
            broker: None,
        }
    }
}
