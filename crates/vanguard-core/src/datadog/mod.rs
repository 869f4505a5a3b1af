//! Datadog HTTP API client
//!
//! Covers the handful of v1 endpoints Vanguard needs: metric series
//! submission, events, API key validation and monitor creation.

mod client;
mod payload;

pub use client::DatadogClient;
pub use payload::{AlertType, EventPayload, SeriesPayload, SeriesPoint};
