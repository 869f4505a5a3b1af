//! Environmental data feed
//!
//! Polls three public sources and turns them into gauges and alert events:
//!
//! - UK Environment Agency flood warnings: `vanguard.flood_risk_level`
//! - Open-Meteo current conditions: `vanguard.solar_radiation`, `vanguard.cloud_cover`
//! - USGS earthquakes of the last hour: `vanguard.seismic_activity`
//!
//! Each source is fetched on its own; a failing source is logged and skipped
//! without affecting the others.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::EnvironmentConfig;
use crate::datadog::{AlertType, DatadogClient, EventPayload};
use crate::error::{Error, Result};
use crate::models::Gauge;
use crate::sink::MetricSink;

/// Number of active flood warnings
pub const FLOOD_RISK_METRIC: &str = "vanguard.flood_risk_level";

/// Shortwave radiation in W/m²
pub const SOLAR_RADIATION_METRIC: &str = "vanguard.solar_radiation";

/// Cloud cover in percent
pub const CLOUD_COVER_METRIC: &str = "vanguard.cloud_cover";

/// Largest earthquake magnitude reported in the last hour
pub const SEISMIC_METRIC: &str = "vanguard.seismic_activity";

/// Flood warning count above which a `FLOOD ALERT` is raised
pub const FLOOD_ALERT_THRESHOLD: u64 = 50;

/// Magnitude above which a `SEISMIC ALERT` is raised
pub const SEISMIC_ALERT_THRESHOLD: f64 = 5.0;

/// One round of environmental readings; `None` marks a source that failed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentalData {
    /// Active flood warnings
    pub flood_warnings: Option<u64>,
    /// Shortwave radiation in W/m²
    pub solar_radiation: Option<f64>,
    /// Cloud cover in percent
    pub cloud_cover: Option<f64>,
    /// Largest magnitude in the last hour, floored at 0
    pub max_seismic_mag: Option<f64>,
}

impl EnvironmentalData {
    /// Gauges for every source that answered
    pub fn gauges(&self, timestamp: DateTime<Utc>) -> Vec<Gauge> {
        #[allow(clippy::cast_precision_loss)]
        let floods = self.flood_warnings.map(|count| count as f64);

        [
            (FLOOD_RISK_METRIC, floods),
            (SOLAR_RADIATION_METRIC, self.solar_radiation),
            (CLOUD_COVER_METRIC, self.cloud_cover),
            (SEISMIC_METRIC, self.max_seismic_mag),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| Gauge::new(name, v, timestamp)))
        .collect()
    }

    /// Events for readings past their alert thresholds
    pub fn alerts(&self) -> Vec<EventPayload> {
        let mut alerts = Vec::new();

        if let Some(count) = self.flood_warnings.filter(|c| *c > FLOOD_ALERT_THRESHOLD) {
            alerts.push(EventPayload::new(
                "FLOOD ALERT",
                format!("High number of flood warnings detected: {count}"),
                AlertType::Warning,
            ));
        }

        if let Some(mag) = self.max_seismic_mag.filter(|m| *m > SEISMIC_ALERT_THRESHOLD) {
            alerts.push(EventPayload::new(
                "SEISMIC ALERT",
                format!("Significant seismic activity detected: MAG {mag}"),
                AlertType::Error,
            ));
        }

        alerts
    }

    /// Console status line
    pub fn status_line(&self) -> String {
        fn show<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
        }

        format!(
            "Environment -> Floods: {} | Solar: {} W/m2 | Cloud: {}% | Seismic: MAG {}",
            show(self.flood_warnings),
            show(self.solar_radiation),
            show(self.cloud_cover),
            show(self.max_seismic_mag),
        )
    }
}

// Response bodies
#[derive(Debug, Deserialize)]
struct FloodResponse {
    #[serde(default)]
    items: Vec<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    cloud_cover: Option<f64>,
    #[serde(default)]
    shortwave_radiation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct QuakeResponse {
    #[serde(default)]
    features: Vec<QuakeFeature>,
}

#[derive(Debug, Default, Deserialize)]
struct QuakeFeature {
    #[serde(default)]
    properties: QuakeProperties,
}

#[derive(Debug, Default, Deserialize)]
struct QuakeProperties {
    #[serde(default)]
    mag: Option<f64>,
}

/// Client for the public environmental data sources
pub struct EnvironmentFeed {
    client: Client,
    config: EnvironmentConfig,
}

impl EnvironmentFeed {
    /// Create a feed for the configured sources
    pub fn new(config: &EnvironmentConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetch every source; failures are logged and leave the field empty
    pub async fn fetch(&self) -> EnvironmentalData {
        let data = EnvironmentalData {
            flood_warnings: log_failure("flood", self.fetch_floods().await),
            solar_radiation: None,
            cloud_cover: None,
            max_seismic_mag: log_failure("seismic", self.fetch_seismic().await),
        };

        match log_failure("weather", self.fetch_weather().await) {
            Some((solar, cloud)) => EnvironmentalData {
                solar_radiation: Some(solar),
                cloud_cover: Some(cloud),
                ..data
            },
            None => data,
        }
    }

    /// Count active flood warnings
    pub async fn fetch_floods(&self) -> Result<u64> {
        let body: FloodResponse = get_json(self.client.get(&self.config.flood_url)).await?;
        Ok(body.items.len() as u64)
    }

    /// Current `(solar_radiation, cloud_cover)`; missing values read as 0
    pub async fn fetch_weather(&self) -> Result<(f64, f64)> {
        let request = self.client.get(&self.config.weather_url).query(&[
            ("latitude", self.config.latitude.to_string()),
            ("longitude", self.config.longitude.to_string()),
            ("current", "cloud_cover,shortwave_radiation".to_string()),
        ]);
        let body: WeatherResponse = get_json(request).await?;

        Ok((
            body.current.shortwave_radiation.unwrap_or(0.0),
            body.current.cloud_cover.unwrap_or(0.0),
        ))
    }

    /// Largest magnitude in the feed; 0 when it is empty
    pub async fn fetch_seismic(&self) -> Result<f64> {
        let body: QuakeResponse = get_json(self.client.get(&self.config.quake_url)).await?;
        Ok(body
            .features
            .iter()
            .map(|f| f.properties.mag.unwrap_or(0.0))
            .fold(0.0, f64::max))
    }
}

async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.header("Accept", "application/json").send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::api(status.as_u16(), body));
    }

    Ok(response.json().await?)
}

fn log_failure<T>(source: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(source, error = %e, "Environmental source unavailable");
            None
        }
    }
}

/// Send the readings to `sink` and post any alerts through `events`.
///
/// Without an events client, alerts are only logged.
pub async fn report<S: MetricSink + ?Sized>(
    data: &EnvironmentalData,
    sink: &S,
    events: Option<&DatadogClient>,
) -> Result<()> {
    for gauge in data.gauges(Utc::now()) {
        sink.gauge(&gauge).await?;
        debug!(metric = %gauge.name, value = gauge.value, "Gauge emitted");
    }

    for alert in data.alerts() {
        warn!(title = %alert.title, text = %alert.text, "Environmental alert");
        match events {
            Some(client) => client.post_event(&alert).await?,
            None => info!(title = %alert.title, "No Datadog API key; alert not posted"),
        }
    }

    Ok(())
}
