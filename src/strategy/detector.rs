//! Put-call parity signal classification

use crate::config::ArbitrageConfig;
use crate::data::{PriceSnapshot, PriceSource};
use crate::trading::trade::{ExitReason, OptionKind, Trade};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Share of the notional gap exposure counted as margin
const MARGIN_FACTOR: Decimal = dec!(0.5);

/// Entry opportunity found in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityOpportunity {
    /// Parity gap
    pub parity_gap: Decimal,
    /// Gap minus transaction costs, per unit
    pub expected_profit: Decimal,
    /// Option to sell (the richer one)
    pub sell: OptionKind,
    /// Option to buy (the cheaper one)
    pub buy: OptionKind,
    /// ATM strike
    pub strike: Decimal,
    /// Premium of the option sold
    pub sell_price: Decimal,
    /// Premium of the option bought
    pub buy_price: Decimal,
    /// Futures at detection
    pub futures: Decimal,
    /// Snapshot time
    pub observed_at: DateTime<Utc>,
    /// Snapshot origin
    pub source: PriceSource,
}

/// Exit instruction for the open trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitDecision {
    /// Condition that fired
    pub reason: ExitReason,
    /// Parity gap at evaluation
    pub parity_gap: Decimal,
}

/// Classification of one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Open a trade
    Entry(ParityOpportunity),
    /// Close the open trade
    Exit(ExitDecision),
    /// Nothing to do
    Hold {
        /// Parity gap at evaluation
        parity_gap: Decimal,
    },
}

impl Signal {
    /// Gap the signal was computed from
    pub fn parity_gap(&self) -> Decimal {
        match self {
            Signal::Entry(opportunity) => opportunity.parity_gap,
            Signal::Exit(decision) => decision.parity_gap,
            Signal::Hold { parity_gap } => *parity_gap,
        }
    }
}

/// Stateless classifier; safe to call every cycle
#[derive(Clone)]
pub struct ArbitrageDetector {
    config: Arc<ArbitrageConfig>,
}

impl ArbitrageDetector {
    /// Create a detector
    pub fn new(config: Arc<ArbitrageConfig>) -> Self {
        Self { config }
    }

    /// Classify `snapshot` given the currently open trade, if any.
    ///
    /// With a trade open the exit conditions are checked in order: parity
    /// restored, holding time, then margin. When both the parity and the
    /// holding time conditions hold, the recorded reason is parity restored.
    pub fn evaluate(&self, snapshot: &PriceSnapshot, open_trade: Option<&Trade>, now: DateTime<Utc>) -> Signal {
        let parity_gap = snapshot.parity_gap();

        match open_trade {
            Some(trade) => match self.exit_reason(trade, parity_gap, now) {
                Some(reason) => Signal::Exit(ExitDecision { reason, parity_gap }),
                None => Signal::Hold { parity_gap },
            },
            None => match self.entry(snapshot, parity_gap) {
                Some(opportunity) => Signal::Entry(opportunity),
                None => Signal::Hold { parity_gap },
            },
        }
    }

    fn exit_reason(&self, trade: &Trade, parity_gap: Decimal, now: DateTime<Utc>) -> Option<ExitReason> {
        if parity_gap < self.config.strategy.exit_threshold {
            return Some(ExitReason::ParityRestored);
        }
        if trade.held_for(now) >= self.config.max_hold() {
            return Some(ExitReason::TimeLimit);
        }
        if self.margin_usage(trade) > self.config.risk.max_margin_usage {
            return Some(ExitReason::MarginBreach);
        }
        None
    }

    /// Margin utilization attributed to an open trade
    pub fn margin_usage(&self, trade: &Trade) -> Decimal {
        let exposure = trade.entry_gap * Decimal::from(trade.quantity()) * MARGIN_FACTOR;
        exposure / self.config.risk.initial_capital
    }

    fn entry(&self, snapshot: &PriceSnapshot, parity_gap: Decimal) -> Option<ParityOpportunity> {
        if parity_gap <= self.config.strategy.min_parity_gap {
            return None;
        }

        let expected_profit = parity_gap - self.config.transaction_costs();
        if expected_profit <= Decimal::ZERO {
            return None;
        }

        let (sell, sell_price, buy, buy_price) = if snapshot.call_price >= snapshot.put_price {
            (OptionKind::Call, snapshot.call_price, OptionKind::Put, snapshot.put_price)
        } else {
            (OptionKind::Put, snapshot.put_price, OptionKind::Call, snapshot.call_price)
        };

        Some(ParityOpportunity {
            parity_gap,
            expected_profit,
            sell,
            buy,
            strike: snapshot.strike,
            sell_price,
            buy_price,
            futures: snapshot.futures,
            observed_at: snapshot.observed_at,
            source: snapshot.source,
        })
    }
}
