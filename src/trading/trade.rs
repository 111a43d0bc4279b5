//! Trade records

use crate::config::TradingMode;
use crate::data::PriceSource;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Option right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionKind {
    /// Call option
    Call,
    /// Put option
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => write!(f, "CE"),
            OptionKind::Put => write!(f, "PE"),
        }
    }
}

/// Listed option contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Underlying index
    pub underlying: String,
    /// Option right
    pub kind: OptionKind,
    /// Strike price
    pub strike: Decimal,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.underlying, self.strike.normalize(), self.kind)
    }
}

/// Leg direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegSide {
    /// Long leg
    Buy,
    /// Short leg
    Sell,
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegSide::Buy => write!(f, "BUY"),
            LegSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One side of a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLeg {
    /// Contract
    pub instrument: Instrument,
    /// Direction
    pub side: LegSide,
    /// Entry premium
    pub price: Decimal,
    /// Units
    pub quantity: u32,
}

impl TradeLeg {
    /// Per-unit profit of this leg if closed at `exit_price`
    pub fn pnl_per_unit(&self, exit_price: Decimal) -> Decimal {
        match self.side {
            LegSide::Sell => self.price - exit_price,
            LegSide::Buy => exit_price - self.price,
        }
    }
}

/// The two option legs of a parity trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLegs {
    /// Short leg on the richer option
    pub sell_leg: TradeLeg,
    /// Long leg on the cheaper option
    pub buy_leg: TradeLeg,
}

/// Leg premiums observed at exit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitPrices {
    /// Exit premium of the short leg
    pub sell_leg: Decimal,
    /// Exit premium of the long leg
    pub buy_leg: Decimal,
}

/// Trade status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    /// Position is held
    Open,
    /// Closed against synthetic prices
    Closed,
    /// Closed against live prices, outcome is hypothetical
    ShadowClosed,
    /// Opportunity recorded while trading was disabled
    DisabledSkip,
}

impl TradeStatus {
    /// Terminal close states
    pub fn is_closed(&self) -> bool {
        matches!(self, TradeStatus::Closed | TradeStatus::ShadowClosed)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "OPEN"),
            TradeStatus::Closed => write!(f, "CLOSED"),
            TradeStatus::ShadowClosed => write!(f, "SHADOW_CLOSED"),
            TradeStatus::DisabledSkip => write!(f, "DISABLED_SKIP"),
        }
    }
}

/// Why a trade was exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Gap fell below the exit threshold
    ParityRestored,
    /// Maximum holding time reached
    TimeLimit,
    /// Margin utilization of the position exceeded the ceiling
    MarginBreach,
}

impl ExitReason {
    /// Metric label
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitReason::ParityRestored => "parity_restored",
            ExitReason::TimeLimit => "time_limit",
            ExitReason::MarginBreach => "margin_breach",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ParityRestored => write!(f, "parity restored"),
            ExitReason::TimeLimit => write!(f, "time limit"),
            ExitReason::MarginBreach => write!(f, "margin breach"),
        }
    }
}

/// A simulated parity position. All P&L figures are per unit of the
/// underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Generation-ordered id, e.g. `PAPER-000001`
    pub id: String,
    /// Mode the trade was taken in
    pub mode: TradingMode,
    /// Origin of the entry prices
    pub source: PriceSource,
    /// Option legs
    pub legs: TradeLegs,
    /// Parity gap at entry
    pub entry_gap: Decimal,
    /// Futures price at entry
    pub entry_futures: Decimal,
    /// Entry time
    pub entry_time: DateTime<Utc>,
    /// Entry gap minus transaction costs
    pub expected_profit: Decimal,
    /// Capital reserved by the risk manager
    pub capital_committed: Decimal,
    /// Lifecycle status
    pub status: TradeStatus,
    /// Exit time
    pub exit_time: Option<DateTime<Utc>>,
    /// Leg premiums at exit
    pub exit_prices: Option<ExitPrices>,
    /// Parity gap at exit
    pub exit_gap: Option<Decimal>,
    /// Leg price deltas minus transaction costs
    pub realized_pnl: Option<Decimal>,
    /// Holding time in milliseconds
    pub duration_ms: Option<i64>,
    /// Exit trigger
    pub exit_reason: Option<ExitReason>,
    /// Realized profit fell below the minimum profit threshold
    pub marginal: bool,
}

impl Trade {
    /// Whether the position is still held
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Units per leg
    pub fn quantity(&self) -> u32 {
        self.legs.sell_leg.quantity
    }

    /// Time held at `now`
    pub fn held_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.entry_time
    }

    /// Realized P&L for the whole position
    pub fn realized_pnl_total(&self) -> Option<Decimal> {
        self.realized_pnl.map(|pnl| pnl * Decimal::from(self.quantity()))
    }
}
