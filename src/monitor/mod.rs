//! Ingestion health monitoring

pub mod connection;
pub mod health;

pub use connection::{ConnectionMonitor, MonitorAction};
pub use health::{ConnectionHealth, LivenessHandle};
