//! Append-only trade event stream

use crate::trading::risk::RiskBlockReason;
use crate::trading::trade::Trade;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// An entry was refused by a risk rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBlockEvent {
    /// Rule that blocked the entry
    pub reason: RiskBlockReason,
    /// Parity gap of the refused opportunity
    pub parity_gap: Decimal,
    /// Id of the DISABLED_SKIP record, when one was written
    pub skip_trade_id: Option<String>,
}

/// The reconnect ceiling was exhausted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlertEvent {
    /// Feed name
    pub feed: String,
    /// Reconnect attempts made
    pub reconnect_attempts: u32,
    /// Last successful ingestion
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Structured trade event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEvent {
    /// A trade was opened
    Entry(Trade),
    /// A trade was closed
    Exit(Trade),
    /// An entry was blocked
    RiskBlock(RiskBlockEvent),
    /// Feed health is beyond automatic recovery
    HealthAlert(HealthAlertEvent),
}

impl TradeEvent {
    /// Event type tag
    pub fn kind(&self) -> &'static str {
        match self {
            TradeEvent::Entry(_) => "ENTRY",
            TradeEvent::Exit(_) => "EXIT",
            TradeEvent::RiskBlock(_) => "RISK_BLOCK",
            TradeEvent::HealthAlert(_) => "HEALTH_ALERT",
        }
    }
}

/// Event with identity and emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event id
    pub id: Uuid,
    /// Emission time
    pub emitted_at: DateTime<Utc>,
    /// Event body
    #[serde(flatten)]
    pub event: TradeEvent,
}

impl EventEnvelope {
    /// Wrap an event
    pub fn new(event: TradeEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            event,
        }
    }
}

/// Consumer of the trade event stream. Delivery must not block.
pub trait EventSink: Send + Sync {
    /// Deliver an already wrapped event
    fn deliver(&self, envelope: EventEnvelope);

    /// Wrap and deliver an event
    fn emit(&self, event: TradeEvent) {
        self.deliver(EventEnvelope::new(event));
    }
}

/// Forwards events to an unbounded tokio channel
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl ChannelEventSink {
    /// Create a sink and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn deliver(&self, envelope: EventEnvelope) {
        if let Err(e) = self.tx.send(envelope) {
            warn!(event = e.0.event.kind(), "Event receiver closed, dropping event");
        }
    }
}

/// Writes every event as one JSON line through tracing
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn deliver(&self, envelope: EventEnvelope) {
        match serde_json::to_string(&envelope) {
            Ok(json) => info!(target: "trade_events", event_type = envelope.event.kind(), event = %json),
            Err(e) => warn!(target: "trade_events", error = %e, "Failed to serialize event"),
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in delivery order
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().clone()
    }

    /// Type tags in delivery order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.event.kind()).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn deliver(&self, envelope: EventEnvelope) {
        self.events.lock().push(envelope);
    }
}
