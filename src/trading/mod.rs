//! Simulated trade lifecycle, risk gating and accounting

pub mod calendar;
pub mod engine;
pub mod events;
pub mod pnl;
pub mod risk;
pub mod state_machine;
pub mod trade;

pub use calendar::{FixedOffsetCalendar, TradingCalendar};
pub use engine::{CycleOutcome, DecisionEngine};
pub use events::{
    ChannelEventSink, EventEnvelope, EventSink, HealthAlertEvent, LogEventSink, RecordingEventSink, RiskBlockEvent,
    TradeEvent,
};
pub use pnl::{PnLAccountant, SessionSummary, StatusReporter, StatusSnapshot};
pub use risk::{RiskBlockReason, RiskDecision, RiskManager, RiskState};
pub use state_machine::TradeStateMachine;
pub use trade::{ExitReason, Instrument, LegSide, OptionKind, Trade, TradeLeg, TradeLegs, TradeStatus};
