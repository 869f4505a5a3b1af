//! Data models for Vanguard

mod metrics;
mod monitor;

pub use metrics::*;
pub use monitor::*;
