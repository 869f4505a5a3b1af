//! Simulator loop - synthetic Raspberry Pi telemetry
//!
//! Every iteration draws a CPU temperature and a readiness score, emits them
//! together with the connectivity heartbeat, prints a status line and sleeps.
//! Sink failures are not retried; they end the loop.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::SimulatorConfig;
use crate::error::Result;
use crate::models::{SampleRange, TelemetrySample};
use crate::sink::MetricSink;

/// Drives a [`MetricSink`] with simulated readings
pub struct Simulator<S> {
    sink: S,
    rng: StdRng,
    cpu_temp: SampleRange,
    readiness: SampleRange,
    interval: Duration,
    iterations: u64,
}

impl<S: MetricSink> Simulator<S> {
    /// Create a simulator; seeds the RNG from `config.seed` or the OS
    pub fn new(sink: S, config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            sink,
            rng,
            cpu_temp: config.cpu_temp,
            readiness: config.readiness,
            interval: config.interval,
            iterations: 0,
        }
    }

    /// The underlying sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Completed iterations
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Draw one telemetry tuple
    pub fn sample(&mut self) -> TelemetrySample {
        let cpu_temp = self.cpu_temp.sample(&mut self.rng);
        let readiness = self.readiness.sample(&mut self.rng);
        TelemetrySample::new(cpu_temp, readiness)
    }

    /// Run one iteration: sample, emit the three gauges, print the status line
    pub async fn tick(&mut self) -> Result<TelemetrySample> {
        let sample = self.sample();

        for gauge in sample.gauges(Utc::now()) {
            self.sink.gauge(&gauge).await?;
            debug!(metric = %gauge.name, value = gauge.value, "Gauge emitted");
        }

        self.iterations += 1;
        println!("{}", sample.status_line());
        info!(
            iteration = self.iterations,
            cpu_temp = sample.cpu_temp,
            readiness = sample.readiness,
            "Telemetry update sent"
        );

        Ok(sample)
    }

    /// Loop forever; only returns when the sink fails
    pub async fn run(&mut self) -> Result<()> {
        println!("Vanguard Traffic Generator Active...");
        println!("Simulating hardware telemetry and environmental data...");
        info!(
            interval = ?self.interval,
            cpu_temp = ?self.cpu_temp,
            readiness = ?self.readiness,
            "Simulator started"
        );

        loop {
            self.tick().await?;
            tokio::time::sleep(self.interval).await;
        }
    }
}
