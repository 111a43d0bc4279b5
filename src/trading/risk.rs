//! Risk gatekeeping for simulated entries

use crate::config::RiskConfig;
use crate::data::PriceSource;
use crate::trading::trade::Trade;
use crate::utils::metrics;
use crate::{log_risk, ArbitrageError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Disabled reason recorded after a losing trade
pub const LOSS_DISABLE_REASON: &str = "loss-triggered disable";

/// Mutable risk accounting, owned by [`RiskManager`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Entries taken on the current trading day
    pub daily_trade_count: u32,
    /// Positions currently held
    pub open_trade_count: u32,
    /// Capital not committed to a position
    pub capital_available: Decimal,
    /// Capital reserved by open positions
    pub capital_committed: Decimal,
    /// Whether new entries may be approved
    pub trading_enabled: bool,
    /// Why trading was disabled
    pub disabled_reason: Option<String>,
    /// Day the daily counters belong to
    pub trading_day: Option<NaiveDate>,
}

/// Rule that refused an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBlockReason {
    /// Trading was switched off for the rest of the run
    TradingDisabled {
        /// Recorded reason
        reason: String,
    },
    /// Daily entry limit reached
    DailyLimit {
        /// Entries today
        count: u32,
        /// Limit
        limit: u32,
    },
    /// Open position limit reached
    OpenTradeLimit {
        /// Open positions
        open: u32,
        /// Limit
        limit: u32,
    },
    /// Committing another tranche would exceed the margin ceiling
    MarginCeiling {
        /// Utilization after the projected commitment
        projected_usage: Decimal,
        /// Ceiling
        ceiling: Decimal,
    },
    /// Nothing left to commit
    InsufficientCapital {
        /// Capital available
        available: Decimal,
    },
}

impl RiskBlockReason {
    /// Metric label
    pub fn as_label(&self) -> &'static str {
        match self {
            RiskBlockReason::TradingDisabled { .. } => "trading_disabled",
            RiskBlockReason::DailyLimit { .. } => "daily_limit",
            RiskBlockReason::OpenTradeLimit { .. } => "open_trade_limit",
            RiskBlockReason::MarginCeiling { .. } => "margin_ceiling",
            RiskBlockReason::InsufficientCapital { .. } => "insufficient_capital",
        }
    }
}

impl fmt::Display for RiskBlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBlockReason::TradingDisabled { reason } => write!(f, "trading disabled ({})", reason),
            RiskBlockReason::DailyLimit { count, limit } => write!(f, "daily trade limit {}/{}", count, limit),
            RiskBlockReason::OpenTradeLimit { open, limit } => write!(f, "open trade limit {}/{}", open, limit),
            RiskBlockReason::MarginCeiling {
                projected_usage,
                ceiling,
            } => write!(f, "margin usage {} above ceiling {}", projected_usage.round_dp(4), ceiling),
            RiskBlockReason::InsufficientCapital { available } => write!(f, "no capital available ({})", available),
        }
    }
}

/// Outcome of an entry check
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    /// Entry allowed; the capital to reserve for it
    Approved {
        /// Capital to commit
        capital: Decimal,
    },
    /// Entry refused
    Blocked(RiskBlockReason),
}

/// Stateful gatekeeper invoked before every entry
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
}

impl RiskManager {
    /// Create a risk manager with the full initial capital available
    pub fn new(config: RiskConfig) -> Self {
        let state = RiskState {
            daily_trade_count: 0,
            open_trade_count: 0,
            capital_available: config.initial_capital,
            capital_committed: Decimal::ZERO,
            trading_enabled: true,
            disabled_reason: None,
            trading_day: None,
        };
        Self { config, state }
    }

    /// Current state
    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Check every entry rule. Does not mutate state.
    pub fn check_entry(&self) -> RiskDecision {
        let state = &self.state;

        if !state.trading_enabled {
            let reason = state.disabled_reason.clone().unwrap_or_else(|| LOSS_DISABLE_REASON.to_string());
            return self.block(RiskBlockReason::TradingDisabled { reason });
        }

        if state.daily_trade_count >= self.config.max_trades_per_day {
            log_risk!(
                debug,
                "daily_limit",
                state.daily_trade_count,
                self.config.max_trades_per_day,
                "Daily trade limit reached"
            );
            return self.block(RiskBlockReason::DailyLimit {
                count: state.daily_trade_count,
                limit: self.config.max_trades_per_day,
            });
        }

        if state.open_trade_count >= self.config.max_open_trades {
            return self.block(RiskBlockReason::OpenTradeLimit {
                open: state.open_trade_count,
                limit: self.config.max_open_trades,
            });
        }

        if state.capital_available <= Decimal::ZERO {
            return self.block(RiskBlockReason::InsufficientCapital {
                available: state.capital_available,
            });
        }

        let projected = state.capital_available * self.config.max_capital_per_trade;
        let equity = state.capital_available + state.capital_committed;
        let projected_usage = (state.capital_committed + projected) / equity;
        if projected_usage > self.config.max_margin_usage {
            log_risk!(
                warn,
                "margin_ceiling",
                projected_usage.round_dp(4),
                self.config.max_margin_usage,
                "Projected margin usage above ceiling"
            );
            return self.block(RiskBlockReason::MarginCeiling {
                projected_usage,
                ceiling: self.config.max_margin_usage,
            });
        }

        RiskDecision::Approved { capital: projected }
    }

    fn block(&self, reason: RiskBlockReason) -> RiskDecision {
        metrics::record_risk_block(reason.as_label());
        RiskDecision::Blocked(reason)
    }

    /// Account for an approved entry
    pub fn on_trade_opened(&mut self, capital: Decimal) {
        self.state.daily_trade_count += 1;
        self.state.open_trade_count += 1;
        self.state.capital_available -= capital;
        self.state.capital_committed += capital;
    }

    /// Release a closed trade's capital, book its P&L and apply the loss
    /// policy
    pub fn on_trade_closed(&mut self, trade: &Trade) -> Result<()> {
        if self.state.open_trade_count == 0 {
            return Err(ArbitrageError::InvariantViolation(format!(
                "trade {} closed while no trade was counted open",
                trade.id
            ))
            .into());
        }
        let realized = trade.realized_pnl_total().ok_or_else(|| {
            ArbitrageError::RiskManagement(format!("trade {} has no realized P&L", trade.id))
        })?;

        self.state.open_trade_count -= 1;
        self.state.capital_committed -= trade.capital_committed;
        self.state.capital_available += trade.capital_committed + realized;

        if realized < Decimal::ZERO && self.loss_disables(trade) {
            self.disable(LOSS_DISABLE_REASON);
        }

        Ok(())
    }

    fn loss_disables(&self, trade: &Trade) -> bool {
        if !self.config.disable_after_loss {
            return false;
        }
        trade.source != PriceSource::Live || self.config.shadow_losses_disable
    }

    /// Switch trading off for the rest of the run
    pub fn disable(&mut self, reason: &str) {
        if !self.state.trading_enabled {
            return;
        }
        warn!(reason, "Trading disabled for the remainder of the run");
        self.state.trading_enabled = false;
        self.state.disabled_reason = Some(reason.to_string());
    }

    /// Reset daily counters when `day` differs from the current trading day.
    /// Returns whether a reset happened; repeated calls for the same day are
    /// no-ops.
    pub fn reset_daily(&mut self, day: NaiveDate) -> bool {
        if self.state.trading_day == Some(day) {
            return false;
        }
        if self.state.trading_day.is_some() {
            info!(%day, previous_count = self.state.daily_trade_count, "New trading day, daily counters reset");
        }
        self.state.trading_day = Some(day);
        self.state.daily_trade_count = 0;
        true
    }
}
