//! P&L aggregation and status reporting

use crate::config::TradingMode;
use crate::trading::risk::RiskState;
use crate::trading::trade::Trade;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Aggregates closed-trade results. Figures are per unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnLAccountant {
    total_pnl: Decimal,
    closed_trades: u32,
    wins: u32,
    losses: u32,
    marginal_closes: u32,
}

impl PnLAccountant {
    /// Empty accountant
    pub fn new() -> Self {
        Self::default()
    }

    /// Book a closed trade
    pub fn record_close(&mut self, trade: &Trade) {
        let Some(realized) = trade.realized_pnl else {
            return;
        };
        self.total_pnl += realized;
        self.closed_trades += 1;
        if realized > Decimal::ZERO {
            self.wins += 1;
        } else if realized < Decimal::ZERO {
            self.losses += 1;
        }
        if trade.marginal {
            self.marginal_closes += 1;
        }
    }

    /// Cumulative realized P&L
    pub fn total_pnl(&self) -> Decimal {
        self.total_pnl
    }

    /// Closed trade count
    pub fn closed_trades(&self) -> u32 {
        self.closed_trades
    }

    /// Profitable closes
    pub fn wins(&self) -> u32 {
        self.wins
    }

    /// Losing closes
    pub fn losses(&self) -> u32 {
        self.losses
    }

    /// Closes below the minimum profit threshold
    pub fn marginal_closes(&self) -> u32 {
        self.marginal_closes
    }
}

/// Point-in-time status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Simulation mode
    pub mode: TradingMode,
    /// Trades currently open
    pub open_trades: u32,
    /// Entries taken today
    pub daily_trades: u32,
    /// Whether entries may be approved
    pub trading_enabled: bool,
    /// Cumulative realized P&L per unit
    pub total_pnl: Decimal,
    /// Closed trades
    pub closed_trades: u32,
    /// Profitable closes
    pub wins: u32,
    /// Losing closes
    pub losses: u32,
    /// Closes below the minimum profit threshold
    pub marginal_closes: u32,
    /// Capital not committed
    pub capital_available: Decimal,
    /// Capital committed to open trades
    pub capital_committed: Decimal,
    /// Why trading was disabled
    pub disabled_reason: Option<String>,
    /// Last parity gap evaluated
    pub last_parity_gap: Option<Decimal>,
    /// When the snapshot was taken
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Combine risk state and P&L figures
    pub fn build(
        mode: TradingMode,
        risk: &RiskState,
        pnl: &PnLAccountant,
        last_parity_gap: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            mode,
            open_trades: risk.open_trade_count,
            daily_trades: risk.daily_trade_count,
            trading_enabled: risk.trading_enabled,
            total_pnl: pnl.total_pnl(),
            closed_trades: pnl.closed_trades(),
            wins: pnl.wins(),
            losses: pnl.losses(),
            marginal_closes: pnl.marginal_closes(),
            capital_available: risk.capital_available,
            capital_committed: risk.capital_committed,
            disabled_reason: risk.disabled_reason.clone(),
            last_parity_gap,
            updated_at: now,
        }
    }
}

/// Publishes status snapshots to any number of readers
pub struct StatusReporter {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusReporter {
    /// Create a reporter holding `initial`
    pub fn new(initial: StatusSnapshot) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the published snapshot
    pub fn publish(&self, status: StatusSnapshot) {
        self.tx.send_replace(status);
    }

    /// Latest published snapshot
    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every publish
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }
}

/// End-of-run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Final status
    pub status: StatusSnapshot,
    /// Every trade record, including any still open
    pub trades: Vec<Trade>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub ended_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Trades still open at shutdown
    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_open())
    }
}
