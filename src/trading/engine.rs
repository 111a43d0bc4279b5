//! Periodic decision loop: freshness -> detection -> risk -> transition

use crate::config::ArbitrageConfig;
use crate::data::{PriceCache, PriceSnapshot};
use crate::strategy::{ArbitrageDetector, ExitDecision, ParityOpportunity, Signal};
use crate::trading::calendar::{FixedOffsetCalendar, TradingCalendar};
use crate::trading::events::{EventSink, RiskBlockEvent, TradeEvent};
use crate::trading::pnl::{PnLAccountant, SessionSummary, StatusReporter, StatusSnapshot};
use crate::trading::risk::{RiskBlockReason, RiskDecision, RiskManager, RiskState};
use crate::trading::state_machine::TradeStateMachine;
use crate::trading::trade::Trade;
use crate::utils::metrics;
use crate::{log_parity, log_risk, log_trade, ArbitrageError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What a single decision cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No fresh snapshot; nothing evaluated
    Stale,
    /// Evaluated, no action
    Held {
        /// Parity gap
        parity_gap: Decimal,
    },
    /// A trade was opened
    Entered {
        /// New trade id
        trade_id: String,
    },
    /// The open trade was closed
    Exited {
        /// Closed trade id
        trade_id: String,
        /// Realized P&L per unit
        realized_pnl: Decimal,
    },
    /// An entry signal was refused
    Blocked(RiskBlockReason),
}

/// Single-owner decision loop. Risk state and trade records live here and
/// are never shared, so one cycle always completes before the next starts.
pub struct DecisionEngine {
    config: Arc<ArbitrageConfig>,
    cache: Arc<PriceCache>,
    detector: ArbitrageDetector,
    risk: RiskManager,
    trades: TradeStateMachine,
    pnl: PnLAccountant,
    reporter: StatusReporter,
    calendar: Box<dyn TradingCalendar>,
    events: Arc<dyn EventSink>,
    last_parity_gap: Option<Decimal>,
    blocked_rule: Option<&'static str>,
    started_at: DateTime<Utc>,
}

impl DecisionEngine {
    /// Create an engine reading from `cache` and emitting to `events`
    pub fn new(config: Arc<ArbitrageConfig>, cache: Arc<PriceCache>, events: Arc<dyn EventSink>) -> Result<Self> {
        let trades = TradeStateMachine::new(Arc::clone(&config))?;
        let risk = RiskManager::new(config.risk.clone());
        let pnl = PnLAccountant::new();
        let calendar = FixedOffsetCalendar::new(config.execution.calendar_utc_offset_minutes)?;
        let now = Utc::now();
        let reporter = StatusReporter::new(StatusSnapshot::build(config.mode, risk.state(), &pnl, None, now));

        Ok(Self {
            detector: ArbitrageDetector::new(Arc::clone(&config)),
            config,
            cache,
            risk,
            trades,
            pnl,
            reporter,
            calendar: Box::new(calendar),
            events,
            last_parity_gap: None,
            blocked_rule: None,
            started_at: now,
        })
    }

    /// Replace the trading calendar
    pub fn with_calendar(mut self, calendar: Box<dyn TradingCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Current status, computed on demand
    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::build(
            self.config.mode,
            self.risk.state(),
            &self.pnl,
            self.last_parity_gap,
            Utc::now(),
        )
    }

    /// Receiver updated after every cycle
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.reporter.subscribe()
    }

    /// Risk accounting
    pub fn risk_state(&self) -> &RiskState {
        self.risk.state()
    }

    /// Every trade record so far
    pub fn trades(&self) -> &[Trade] {
        self.trades.history()
    }

    /// The open trade, if any
    pub fn open_trade(&self) -> Option<&Trade> {
        self.trades.open_trade()
    }

    /// Run one decision cycle at `now`.
    ///
    /// Checks run before any mutation, so an error leaves trade and risk
    /// state as they were. Stale data is not an error.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let trading_day = self.calendar.trading_day(now)?;
        self.risk.reset_daily(trading_day);

        let snapshot = match self.cache.fresh_at(now) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(reason = %e, "Skipping decision cycle");
                metrics::record_stale_cycle();
                self.publish_status(now);
                return Ok(CycleOutcome::Stale);
            }
        };

        let signal = self.detector.evaluate(&snapshot, self.trades.open_trade(), now);
        let parity_gap = signal.parity_gap();
        self.last_parity_gap = Some(parity_gap);
        metrics::record_parity_gap(parity_gap);

        let outcome = match signal {
            Signal::Entry(opportunity) => self.enter(&opportunity, now)?,
            Signal::Exit(decision) => self.exit(&decision, &snapshot, now)?,
            Signal::Hold { parity_gap } => {
                log_parity!(
                    debug,
                    snapshot.strike,
                    parity_gap,
                    self.config.strategy.min_parity_gap,
                    open_trade = self.trades.open_trade().is_some(),
                    "Holding"
                );
                self.blocked_rule = None;
                CycleOutcome::Held { parity_gap }
            }
        };

        self.publish_status(now);
        Ok(outcome)
    }

    fn enter(&mut self, opportunity: &ParityOpportunity, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let capital = match self.risk.check_entry() {
            RiskDecision::Approved { capital } => capital,
            RiskDecision::Blocked(reason) => return self.block(opportunity, reason, now),
        };

        let trade = self.trades.open(opportunity, capital, now)?.clone();
        self.risk.on_trade_opened(capital);
        self.blocked_rule = None;

        log_trade!(
            info,
            trade.id,
            "ENTRY",
            trade.entry_gap,
            expected_profit = %trade.expected_profit,
            sell = %trade.legs.sell_leg.instrument,
            sell_price = %trade.legs.sell_leg.price,
            buy = %trade.legs.buy_leg.instrument,
            buy_price = %trade.legs.buy_leg.price,
            "Opened parity trade"
        );
        metrics::record_trade_entry();

        let trade_id = trade.id.clone();
        self.events.emit(TradeEvent::Entry(trade));
        Ok(CycleOutcome::Entered { trade_id })
    }

    /// A blocked episode is reported once, however many cycles it lasts
    fn block(
        &mut self,
        opportunity: &ParityOpportunity,
        reason: RiskBlockReason,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        let rule = reason.as_label();
        if self.blocked_rule == Some(rule) {
            return Ok(CycleOutcome::Blocked(reason));
        }

        let skip_trade_id = match reason {
            RiskBlockReason::TradingDisabled { .. } => Some(self.trades.record_skip(opportunity, now)?.id.clone()),
            _ => None,
        };
        self.blocked_rule = Some(rule);

        log_risk!(
            warn,
            rule,
            opportunity.parity_gap,
            self.config.strategy.min_parity_gap,
            detail = %reason,
            "Entry blocked"
        );
        self.events.emit(TradeEvent::RiskBlock(RiskBlockEvent {
            reason: reason.clone(),
            parity_gap: opportunity.parity_gap,
            skip_trade_id,
        }));

        Ok(CycleOutcome::Blocked(reason))
    }

    fn exit(&mut self, decision: &ExitDecision, snapshot: &PriceSnapshot, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let trade = self.trades.close(decision, snapshot, now)?.clone();
        self.risk.on_trade_closed(&trade)?;
        self.pnl.record_close(&trade);

        let realized_pnl = trade.realized_pnl.unwrap_or_default();
        log_trade!(
            info,
            trade.id,
            "EXIT",
            decision.parity_gap,
            reason = %decision.reason,
            status = %trade.status,
            realized_pnl = %realized_pnl,
            marginal = trade.marginal,
            duration_ms = trade.duration_ms.unwrap_or_default(),
            "Closed parity trade"
        );
        if trade.marginal {
            warn!(trade_id = %trade.id, %realized_pnl, "Near-breakeven close");
        }
        metrics::record_trade_exit(decision.reason.as_label(), self.pnl.total_pnl());

        let trade_id = trade.id.clone();
        self.events.emit(TradeEvent::Exit(trade));
        Ok(CycleOutcome::Exited { trade_id, realized_pnl })
    }

    fn publish_status(&self, now: DateTime<Utc>) {
        self.reporter.publish(StatusSnapshot::build(
            self.config.mode,
            self.risk.state(),
            &self.pnl,
            self.last_parity_gap,
            now,
        ));
    }

    fn log_status(&self) {
        let status = self.reporter.status_snapshot();
        info!(
            mode = %status.mode,
            open_trades = status.open_trades,
            daily_trades = status.daily_trades,
            trading_enabled = status.trading_enabled,
            total_pnl = %status.total_pnl,
            last_parity_gap = ?status.last_parity_gap,
            snapshots_accepted = self.cache.stats().accepted,
            "Status"
        );
    }

    /// Final report
    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            status: StatusSnapshot::build(self.config.mode, self.risk.state(), &self.pnl, self.last_parity_gap, now),
            trades: self.trades.history().to_vec(),
            started_at: self.started_at,
            ended_at: now,
        }
    }

    /// Run cycles on the configured interval until `shutdown` flips.
    ///
    /// A cycle is synchronous, so shutdown is only observed between cycles.
    /// An open trade is left open and reported in the summary. Invariant
    /// violations stop the loop and are returned.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<SessionSummary> {
        let mut ticker = tokio::time::interval(self.config.decision_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let status_every = self.config.status_interval();
        let mut last_status_log = Utc::now();

        info!(
            mode = %self.config.mode,
            interval_secs = self.config.execution.decision_interval_secs,
            "Decision loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if let Err(e) = self.run_cycle(now) {
                        if is_fatal(&e) {
                            error!(error = %e, "Invariant violation, halting decision loop");
                            return Err(e);
                        }
                        warn!(error = %e, "Decision cycle aborted");
                    }
                    if now - last_status_log >= status_every {
                        self.log_status();
                        last_status_log = now;
                    }
                }
            }
        }

        if let Some(trade) = self.trades.open_trade() {
            warn!(trade_id = %trade.id, "Stopping with a trade still open");
        }
        info!("Decision loop stopped");
        Ok(self.summary(Utc::now()))
    }
}

fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ArbitrageError>()
        .map_or(false, ArbitrageError::is_fatal)
}
