//! Datadog monitor definitions
//!
//! The repository ships its monitors as JSON documents in the format the
//! Datadog monitor import accepts. These types let the CLI validate a document
//! offline and push it through the API; alert evaluation stays server side.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The connectivity monitor shipped in `monitors/connectivity_lost.json`
pub const CONNECTIVITY_LOST_JSON: &str =
    include_str!("../../../../monitors/connectivity_lost.json");

static QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<time_agg>\w+)\((?P<window>\w+)\):(?P<space_agg>\w+):",
        r"(?P<metric>[A-Za-z0-9_.]+)\{(?P<scope>[^}]*)\}(?:\s+by\s+\{[^}]*\})?",
        r"\s*(?P<op><=|>=|==|!=|<|>)\s*(?P<threshold>-?\d+(?:\.\d+)?)\s*$",
    ))
    .expect("monitor query pattern is valid")
});

/// Monitor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorType {
    /// Threshold on a metric query
    #[serde(rename = "metric alert")]
    MetricAlert,
    /// Threshold on an arbitrary query
    #[serde(rename = "query alert")]
    QueryAlert,
}

/// Publication state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    /// Saved but not notifying
    Draft,
    /// Live
    Published,
}

/// Threshold values keyed by alert level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorThresholds {
    /// Alert level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    /// Recovery from alert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_recovery: Option<f64>,
    /// Warning level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    /// Recovery from warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_recovery: Option<f64>,
}

/// Monitor options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOptions {
    /// Alert thresholds
    pub thresholds: MonitorThresholds,
    /// Notify when the query stops returning data
    pub notify_no_data: bool,
    /// Minutes without data before a no-data alert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_data_timeframe: Option<u32>,
    /// Notify tagged users on monitor changes
    pub notify_audit: bool,
    /// Seconds to wait before evaluating a new host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_host_delay: Option<u32>,
    /// Include triggering tags in the notification title
    pub include_tags: bool,
}

/// A Datadog monitor as exported/imported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorDefinition {
    /// Platform-assigned id; never sent on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Display name
    pub name: String,
    /// Monitor type
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    /// Query the platform evaluates
    pub query: String,
    /// Notification body
    pub message: String,
    /// Monitor tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Evaluation options
    #[serde(default)]
    pub options: MonitorOptions,
    /// Priority from 1 (highest) to 5
    #[serde(default)]
    pub priority: Option<u8>,
    /// Publication state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_status: Option<DraftStatus>,
}

impl MonitorDefinition {
    /// Parse a monitor document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::monitor(format!("not a monitor document: {e}")))
    }

    /// The shipped connectivity monitor
    pub fn connectivity_lost() -> Result<Self> {
        Self::from_json(CONNECTIVITY_LOST_JSON)
    }

    /// Check the document is internally consistent and return its parsed query
    pub fn validate(&self) -> Result<MetricQuery> {
        if self.name.trim().is_empty() {
            return Err(Error::monitor("name must not be empty"));
        }

        if let Some(priority) = self.priority {
            if !(1..=5).contains(&priority) {
                return Err(Error::monitor(format!("priority {priority} is outside 1..=5")));
            }
        }

        let query = MetricQuery::parse(&self.query)?;

        match self.options.thresholds.critical {
            Some(critical) if (critical - query.threshold).abs() < f64::EPSILON => {}
            Some(critical) => {
                return Err(Error::monitor(format!(
                    "critical threshold {critical} does not match query threshold {}",
                    query.threshold
                )));
            }
            None => return Err(Error::monitor("options.thresholds.critical is required")),
        }

        Ok(query)
    }

    /// Validate, then require the query to target one of `emitted`
    pub fn validate_emitted(&self, emitted: &[&str]) -> Result<MetricQuery> {
        let query = self.validate()?;

        if !emitted.contains(&query.metric.as_str()) {
            return Err(Error::monitor(format!(
                "monitor '{}' queries '{}', which is never emitted",
                self.name, query.metric
            )));
        }

        Ok(query)
    }

    /// Whether the query targets `metric`
    pub fn references(&self, metric: &str) -> bool {
        MetricQuery::parse(&self.query).is_ok_and(|q| q.metric == metric)
    }
}

/// Comparison in a monitor query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl FromStr for Comparator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Gte),
            "<=" => Ok(Self::Lte),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(Error::monitor(format!("unknown comparator '{other}'"))),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        f.write_str(symbol)
    }
}

/// A parsed metric-alert query such as
/// `sum(last_5m):sum:vanguard.pi.connectivity{app:vanguard} < 1`
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    /// Aggregation over time, e.g. `sum`, `avg`
    pub time_aggregator: String,
    /// Evaluation window, e.g. `last_5m`
    pub window: String,
    /// Aggregation across series
    pub space_aggregator: String,
    /// Metric name
    pub metric: String,
    /// Scope tags; empty for `*`
    pub scope: Vec<String>,
    /// Comparison against the threshold
    pub comparator: Comparator,
    /// Threshold value
    pub threshold: f64,
}

impl MetricQuery {
    /// Parse a metric-alert query
    pub fn parse(query: &str) -> Result<Self> {
        let caps = QUERY_RE
            .captures(query)
            .ok_or_else(|| Error::monitor(format!("unsupported query '{query}'")))?;

        let scope = match caps["scope"].trim() {
            "" | "*" => Vec::new(),
            scope => scope.split(',').map(|tag| tag.trim().to_string()).collect(),
        };

        let threshold = caps["threshold"]
            .parse::<f64>()
            .map_err(|e| Error::monitor(format!("bad threshold: {e}")))?;

        Ok(Self {
            time_aggregator: caps["time_agg"].to_string(),
            window: caps["window"].to_string(),
            space_aggregator: caps["space_agg"].to_string(),
            metric: caps["metric"].to_string(),
            scope,
            comparator: caps["op"].parse()?,
            threshold,
        })
    }
}
