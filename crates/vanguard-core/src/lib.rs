//! # Vanguard
//!
//! Synthetic telemetry generator for the Vanguard Raspberry Pi, plus the
//! Datadog monitor definitions that watch it.
//!
//! The simulator emits three gauges per interval:
//!
//! - `vanguard.pi.cpu_temp`: CPU temperature, uniform in [45, 70] °C
//! - `vanguard.system_readiness`: readiness score, uniform in [60, 98] %
//! - `vanguard.pi.connectivity`: always `1`, tagged `app:vanguard`
//!
//! The [`environment`] feed adds flood, solar, cloud cover and seismic gauges
//! from public data sources, with alert events past fixed thresholds.
//!
//! The connectivity gauge feeds the `[Vanguard] Pi Connectivity Lost` monitor
//! shipped in `monitors/connectivity_lost.json`, which alerts on missing data.
//!
//! ## Quick Start
//!
//! ```bash
//! # Emit to the local Datadog agent every 15 seconds
//! vanguard run
//!
//! # Emit through the HTTP API instead
//! DD_API_KEY=... vanguard run --transport http
//!
//! # Poll the environmental sources once
//! vanguard environment --transport log
//!
//! # Check the monitor document against the emitted metrics
//! vanguard monitor validate
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod datadog;
pub mod environment;
pub mod error;
pub mod models;
pub mod simulator;
pub mod sink;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::datadog::DatadogClient;
    pub use crate::environment::{EnvironmentFeed, EnvironmentalData};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::simulator::Simulator;
    pub use crate::sink::{MetricSink, Transport};
}
