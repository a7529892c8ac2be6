//! # Utility Modules
//!
//! Logging setup and counters shared by the sender and receiver.

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
