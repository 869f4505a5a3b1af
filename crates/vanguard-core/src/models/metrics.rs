//! Metrics data models

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Simulated Raspberry Pi CPU temperature in degrees Celsius
pub const CPU_TEMP_METRIC: &str = "vanguard.pi.cpu_temp";

/// Simulated environmental safety score in percent
pub const READINESS_METRIC: &str = "vanguard.system_readiness";

/// Always-1 heartbeat consumed by the connectivity monitor
pub const CONNECTIVITY_METRIC: &str = "vanguard.pi.connectivity";

/// Tag carried by the connectivity heartbeat
pub const CONNECTIVITY_TAG: &str = "app:vanguard";

/// Every metric the simulator emits, in emission order
pub const EMITTED_METRICS: [&str; 3] = [CPU_TEMP_METRIC, READINESS_METRIC, CONNECTIVITY_METRIC];

/// Inclusive bounds for a uniformly sampled value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl SampleRange {
    /// Create a new range
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Reject non-finite, inverted or overflowing bounds
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(Error::config(format!("{name} bounds must be finite")));
        }
        if self.min > self.max {
            return Err(Error::config(format!(
                "{name} min ({}) is greater than max ({})",
                self.min, self.max
            )));
        }
        // The uniform sampler scales the width up slightly; keep headroom.
        if !((self.max - self.min) * 2.0).is_finite() {
            return Err(Error::config(format!(
                "{name} width from {} to {} overflows",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Whether `value` lies within the bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Draw a value uniformly from the range
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..=self.max)
    }
}

/// A point-in-time gauge reading addressed to a metrics sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    /// Metric name
    pub name: String,
    /// Reading
    pub value: f64,
    /// `key:value` tags
    pub tags: Vec<String>,
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
}

impl Gauge {
    /// Create an untagged gauge reading
    pub fn new(name: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value,
            tags: Vec::new(),
            timestamp,
        }
    }

    /// Attach a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// One simulated telemetry tuple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// CPU temperature in degrees Celsius
    pub cpu_temp: f64,
    /// Readiness score in percent
    pub readiness: f64,
    /// Connectivity flag, always 1
    pub connectivity: f64,
}

impl TelemetrySample {
    /// Build a sample; the connectivity flag is fixed
    pub fn new(cpu_temp: f64, readiness: f64) -> Self {
        Self {
            cpu_temp,
            readiness,
            connectivity: 1.0,
        }
    }

    /// The three gauges for this sample, in emission order
    pub fn gauges(&self, timestamp: DateTime<Utc>) -> [Gauge; 3] {
        [
            Gauge::new(CPU_TEMP_METRIC, self.cpu_temp, timestamp),
            Gauge::new(READINESS_METRIC, self.readiness, timestamp),
            Gauge::new(CONNECTIVITY_METRIC, self.connectivity, timestamp)
                .with_tag(CONNECTIVITY_TAG),
        ]
    }

    /// Console status line
    pub fn status_line(&self) -> String {
        format!(
            "Update Sent -> CPU: {:.1}C | Readiness: {:.1}%",
            self.cpu_temp, self.readiness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_connectivity_gauge_is_tagged_one() {
        let sample = TelemetrySample::new(50.0, 75.0);
        let [cpu, readiness, connectivity] = sample.gauges(Utc::now());

        assert!(cpu.tags.is_empty());
        assert!(readiness.tags.is_empty());
        assert_eq!(connectivity.name, CONNECTIVITY_METRIC);
        assert_eq!(connectivity.value, 1.0);
        assert_eq!(connectivity.tags, vec![CONNECTIVITY_TAG.to_string()]);
    }

    #[test]
    fn test_status_line_format() {
        let sample = TelemetrySample::new(57.349, 81.06);
        assert_eq!(sample.status_line(), "Update Sent -> CPU: 57.3C | Readiness: 81.1%");
    }

    #[test]
    fn test_degenerate_range_samples_its_bound() {
        let range = SampleRange::new(42.0, 42.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(range.sample(&mut rng), 42.0);
    }

    #[test]
    fn test_range_validation() {
        assert!(SampleRange::new(1.0, 2.0).validate("r").is_ok());
        assert!(SampleRange::new(2.0, 1.0).validate("r").is_err());
        assert!(SampleRange::new(f64::NAN, 1.0).validate("r").is_err());
        assert!(SampleRange::new(0.0, f64::INFINITY).validate("r").is_err());
        assert!(SampleRange::new(-1.0e308, 1.0e308).validate("r").is_err());
        assert!(SampleRange::new(0.0, f64::MAX).validate("r").is_err());
    }

    #[test]
    fn test_widest_accepted_range_samples() {
        let range = SampleRange::new(-1.0e300, 1.0e300);
        assert!(range.validate("r").is_ok());

        let mut rng = StdRng::seed_from_u64(1);
        assert!(range.contains(range.sample(&mut rng)));
    }

    proptest! {
        #[test]
        fn sampled_values_stay_in_bounds(
            seed in any::<u64>(),
            min in -1000.0f64..1000.0,
            width in 0.0f64..500.0,
        ) {
            let range = SampleRange::new(min, min + width);
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..16 {
                prop_assert!(range.contains(range.sample(&mut rng)));
            }
        }
    }
}
