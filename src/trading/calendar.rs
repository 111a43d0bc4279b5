//! Trading day boundaries

use crate::{ArbitrageError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Maps instants to trading days
pub trait TradingCalendar: Send + Sync {
    /// Trading day containing `at`. An error aborts the decision cycle
    /// before any state changes; `InvariantViolation` halts the loop.
    fn trading_day(&self, at: DateTime<Utc>) -> Result<NaiveDate>;
}

/// Calendar whose day starts at local midnight of a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetCalendar {
    offset: FixedOffset,
}

impl FixedOffsetCalendar {
    /// Calendar at `minutes` east of UTC (330 for IST)
    pub fn new(minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| ArbitrageError::Config(format!("UTC offset of {} minutes is out of range", minutes)))?;
        Ok(Self { offset })
    }
}

impl TradingCalendar for FixedOffsetCalendar {
    fn trading_day(&self, at: DateTime<Utc>) -> Result<NaiveDate> {
        Ok(at.with_timezone(&self.offset).date_naive())
    }
}
