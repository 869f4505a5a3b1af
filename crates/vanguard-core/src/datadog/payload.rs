//! Request and response bodies for the Datadog v1 API

use serde::{Deserialize, Serialize};

use crate::models::Gauge;

/// Body of `POST /api/v1/series`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPayload {
    /// Series to submit
    pub series: Vec<SeriesPoint>,
}

impl SeriesPayload {
    /// Build a payload with one series per gauge, each carrying `base_tags`
    /// ahead of its own tags
    pub fn from_gauges(gauges: &[Gauge], base_tags: &[String]) -> Self {
        Self {
            series: gauges
                .iter()
                .map(|gauge| SeriesPoint::from(gauge).with_base_tags(base_tags))
                .collect(),
        }
    }
}

/// A single-point gauge series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Metric name
    pub metric: String,
    /// `[unix_seconds, value]` pairs
    pub points: Vec<(i64, f64)>,
    /// Always `gauge`
    #[serde(rename = "type")]
    pub metric_type: &'static str,
    /// Tags
    pub tags: Vec<String>,
}

impl SeriesPoint {
    fn with_base_tags(mut self, base_tags: &[String]) -> Self {
        let own = std::mem::take(&mut self.tags);
        let mut tags = base_tags.to_vec();
        for tag in own {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.tags = tags;
        self
    }
}

impl From<&Gauge> for SeriesPoint {
    fn from(gauge: &Gauge) -> Self {
        Self {
            metric: gauge.name.clone(),
            points: vec![(gauge.timestamp.timestamp(), gauge.value)],
            metric_type: "gauge",
            tags: gauge.tags.clone(),
        }
    }
}

/// Event severity as understood by the events API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Informational
    #[default]
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}

/// Body of `POST /api/v1/events`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    /// Event title
    pub title: String,
    /// Event body
    pub text: String,
    /// Severity
    pub alert_type: AlertType,
    /// Tags
    pub tags: Vec<String>,
}

impl EventPayload {
    /// Create an event carrying the standard Vanguard tags
    pub fn new(title: impl Into<String>, text: impl Into<String>, alert_type: AlertType) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            alert_type,
            tags: vec!["app:vanguard".to_string(), "source:vanguard".to_string()],
        }
    }
}

// Response bodies
#[derive(Debug, Deserialize)]
pub(crate) struct ValidateResponse {
    #[serde(default)]
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedMonitor {
    pub id: u64,
}
