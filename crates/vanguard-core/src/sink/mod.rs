//! Metric sinks - where simulated gauges go
//!
//! The simulator only knows the [`MetricSink`] trait. Concrete transports:
//!
//! - **statsd**: DogStatsD datagrams to the local Datadog agent
//! - **http**: Datadog v1 series API (see [`DatadogClient`](crate::datadog::DatadogClient))
//! - **log**: dry run, gauges are only logged

mod statsd;

pub use statsd::{format_line, StatsdSink};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::datadog::DatadogClient;
use crate::error::Result;
use crate::models::Gauge;

/// Transport used to deliver gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// DogStatsD over UDP
    #[default]
    Statsd,
    /// Datadog HTTP series API
    Http,
    /// Log only
    Log,
}

/// Destination for gauge readings
#[async_trait::async_trait]
pub trait MetricSink: Send + Sync {
    /// Submit a single gauge reading
    async fn gauge(&self, gauge: &Gauge) -> Result<()>;
}

#[async_trait::async_trait]
impl<S: MetricSink + ?Sized> MetricSink for Box<S> {
    async fn gauge(&self, gauge: &Gauge) -> Result<()> {
        (**self).gauge(gauge).await
    }
}

/// Sink that only logs readings
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl MetricSink for LogSink {
    async fn gauge(&self, gauge: &Gauge) -> Result<()> {
        info!(
            metric = %gauge.name,
            value = gauge.value,
            tags = ?gauge.tags,
            "Gauge (dry run)"
        );
        Ok(())
    }
}

/// Build the sink for `transport`
pub async fn connect(transport: Transport, config: &Config) -> Result<Box<dyn MetricSink>> {
    let sink: Box<dyn MetricSink> = match transport {
        Transport::Statsd => Box::new(StatsdSink::connect(&config.statsd.address()).await?),
        Transport::Http => Box::new(DatadogClient::new(&config.datadog)?),
        Transport::Log => Box::new(LogSink),
    };

    info!(?transport, "Metric sink ready");
    Ok(sink)
}
