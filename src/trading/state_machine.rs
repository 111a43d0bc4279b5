//! Trade lifecycle: NONE -> OPEN -> CLOSED | SHADOW_CLOSED

use crate::config::{ArbitrageConfig, ConfigDefaults};
use crate::data::{PriceSnapshot, PriceSource};
use crate::strategy::{ExitDecision, ParityOpportunity};
use crate::trading::trade::{
    ExitPrices, Instrument, LegSide, OptionKind, Trade, TradeLeg, TradeLegs, TradeStatus,
};
use crate::{ArbitrageError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Owns every trade record of the run and the single open slot
pub struct TradeStateMachine {
    config: Arc<ArbitrageConfig>,
    quantity: u32,
    next_sequence: u64,
    open_index: Option<usize>,
    history: Vec<Trade>,
}

impl TradeStateMachine {
    /// Create an empty state machine. The contract lot size is checked here
    /// once and never changes afterwards.
    pub fn new(config: Arc<ArbitrageConfig>) -> Result<Self> {
        let quantity = config.contract.lot_size;
        if quantity == 0 || quantity != ConfigDefaults::LOT_SIZE {
            return Err(ArbitrageError::InvariantViolation(format!(
                "lot size {} differs from contract size {}",
                quantity,
                ConfigDefaults::LOT_SIZE
            ))
            .into());
        }

        Ok(Self {
            config,
            quantity,
            next_sequence: 1,
            open_index: None,
            history: Vec::new(),
        })
    }

    /// The open trade, if any
    pub fn open_trade(&self) -> Option<&Trade> {
        self.open_index.and_then(|index| self.history.get(index))
    }

    /// Every record created this run, in creation order
    pub fn history(&self) -> &[Trade] {
        &self.history
    }

    /// Trades in a terminal close state
    pub fn closed_count(&self) -> usize {
        self.history.iter().filter(|t| t.status.is_closed()).count()
    }

    /// Open a trade for an approved opportunity
    pub fn open(
        &mut self,
        opportunity: &ParityOpportunity,
        capital_committed: Decimal,
        now: DateTime<Utc>,
    ) -> Result<&Trade> {
        if let Some(open) = self.open_trade() {
            return Err(ArbitrageError::Trading(format!("trade {} is already open", open.id)).into());
        }

        let trade = self.build(opportunity, capital_committed, now, TradeStatus::Open)?;
        if trade.expected_profit <= Decimal::ZERO {
            return Err(ArbitrageError::Trading(format!(
                "expected profit {} is not positive",
                trade.expected_profit
            ))
            .into());
        }

        self.next_sequence += 1;
        self.history.push(trade);
        let index = self.history.len() - 1;
        self.open_index = Some(index);
        Ok(&self.history[index])
    }

    /// Append a DISABLED_SKIP record for an opportunity refused because
    /// trading is disabled
    pub fn record_skip(&mut self, opportunity: &ParityOpportunity, now: DateTime<Utc>) -> Result<&Trade> {
        let trade = self.build(opportunity, Decimal::ZERO, now, TradeStatus::DisabledSkip)?;
        self.next_sequence += 1;
        self.history.push(trade);
        Ok(&self.history[self.history.len() - 1])
    }

    /// Close the open trade at the snapshot's leg prices. Fails without
    /// mutating anything when no trade is open.
    pub fn close(&mut self, decision: &ExitDecision, snapshot: &PriceSnapshot, now: DateTime<Utc>) -> Result<&Trade> {
        let index = self
            .open_index
            .ok_or_else(|| ArbitrageError::Trading("no open trade to close".to_string()))?;
        let costs = self.config.transaction_costs();
        let min_profit = self.config.strategy.min_profit_threshold;

        let trade = self
            .history
            .get(index)
            .ok_or_else(|| ArbitrageError::InvariantViolation(format!("open trade index {} is missing", index)))?;
        if !trade.is_open() {
            return Err(ArbitrageError::Trading(format!("trade {} is already {}", trade.id, trade.status)).into());
        }

        let exit_prices = ExitPrices {
            sell_leg: premium(snapshot, trade.legs.sell_leg.instrument.kind),
            buy_leg: premium(snapshot, trade.legs.buy_leg.instrument.kind),
        };
        let captured = trade.legs.sell_leg.pnl_per_unit(exit_prices.sell_leg)
            + trade.legs.buy_leg.pnl_per_unit(exit_prices.buy_leg);
        let realized = captured - costs;
        let status = match trade.source {
            PriceSource::Live => TradeStatus::ShadowClosed,
            PriceSource::Simulated => TradeStatus::Closed,
        };
        let duration_ms = trade.held_for(now).num_milliseconds();

        let trade = &mut self.history[index];
        trade.status = status;
        trade.exit_time = Some(now);
        trade.exit_prices = Some(exit_prices);
        trade.exit_gap = Some(decision.parity_gap);
        trade.realized_pnl = Some(realized);
        trade.duration_ms = Some(duration_ms);
        trade.exit_reason = Some(decision.reason);
        trade.marginal = realized < min_profit;
        self.open_index = None;

        Ok(&self.history[index])
    }

    fn build(
        &self,
        opportunity: &ParityOpportunity,
        capital_committed: Decimal,
        now: DateTime<Utc>,
        status: TradeStatus,
    ) -> Result<Trade> {
        if self.config.contract.lot_size != self.quantity {
            return Err(ArbitrageError::InvariantViolation(format!(
                "lot size changed from {} to {}",
                self.quantity, self.config.contract.lot_size
            ))
            .into());
        }

        let leg = |kind: OptionKind, side: LegSide, price: Decimal| TradeLeg {
            instrument: Instrument {
                underlying: self.config.contract.underlying.clone(),
                kind,
                strike: opportunity.strike,
            },
            side,
            price,
            quantity: self.quantity,
        };

        Ok(Trade {
            id: format!("{}-{:06}", self.config.mode, self.next_sequence),
            mode: self.config.mode,
            source: opportunity.source,
            legs: TradeLegs {
                sell_leg: leg(opportunity.sell, LegSide::Sell, opportunity.sell_price),
                buy_leg: leg(opportunity.buy, LegSide::Buy, opportunity.buy_price),
            },
            entry_gap: opportunity.parity_gap,
            entry_futures: opportunity.futures,
            entry_time: now,
            expected_profit: opportunity.parity_gap - self.config.transaction_costs(),
            capital_committed,
            status,
            exit_time: None,
            exit_prices: None,
            exit_gap: None,
            realized_pnl: None,
            duration_ms: None,
            exit_reason: None,
            marginal: false,
        })
    }
}

fn premium(snapshot: &PriceSnapshot, kind: OptionKind) -> Decimal {
    match kind {
        OptionKind::Call => snapshot.call_price,
        OptionKind::Put => snapshot.put_price,
    }
}
