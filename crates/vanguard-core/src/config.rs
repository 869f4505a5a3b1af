//! Configuration management for Vanguard
//!
//! Settings are layered: built-in defaults, then an optional config file,
//! then `VANGUARD__SECTION__KEY` environment variables, and finally the
//! conventional `DD_API_KEY` / `DD_APP_KEY` / `DD_SITE` variables.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::SampleRange;
use crate::sink::Transport;

/// Prefix for structured environment overrides
pub const ENV_PREFIX: &str = "VANGUARD";

/// Main configuration struct
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Datadog API configuration
    pub datadog: DatadogConfig,

    /// DogStatsD agent configuration
    pub statsd: StatsdConfig,

    /// Simulator configuration
    pub simulator: SimulatorConfig,

    /// Environmental data feed configuration
    pub environment: EnvironmentConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the process environment and an optional file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration, reading environment variables from `env` instead
    /// of the process environment when it is provided
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let lookup = |key: &str| -> Option<String> {
            let value = match &env {
                Some(map) => map.get(key).cloned(),
                None => std::env::var(key).ok(),
            };
            value.filter(|v| !v.trim().is_empty())
        };

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .source(env.clone()),
            )
            .set_override_option("datadog.api_key", lookup("DD_API_KEY"))?
            .set_override_option("datadog.app_key", lookup("DD_APP_KEY"))?
            .set_override_option("datadog.site", lookup("DD_SITE"))?;

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.simulator.cpu_temp.validate("simulator.cpu_temp")?;
        self.simulator.readiness.validate("simulator.readiness")?;

        if self.simulator.interval.is_zero() {
            return Err(Error::config("simulator.interval must be greater than zero"));
        }

        if self.datadog.site.trim().is_empty() && self.datadog.api_url.is_none() {
            return Err(Error::config("datadog.site must not be empty"));
        }

        self.environment.validate()
    }
}

/// Public data sources polled by `vanguard environment`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// UK Environment Agency flood warnings endpoint
    pub flood_url: String,
    /// Open-Meteo forecast endpoint
    pub weather_url: String,
    /// USGS earthquake feed (GeoJSON)
    pub quake_url: String,
    /// Latitude used for the weather lookup
    pub latitude: f64,
    /// Longitude used for the weather lookup
    pub longitude: f64,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl EnvironmentConfig {
    /// Reject coordinates outside the globe
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::config(format!(
                "environment.latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::config(format!(
                "environment.longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            flood_url: "https://environment.data.gov.uk/flood-monitoring/id/floods".to_string(),
            weather_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            quake_url: "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_hour.geojson"
                .to_string(),
            latitude: 51.5074,
            longitude: -0.1278,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Datadog API configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatadogConfig {
    /// API key used for metric submission and key validation
    pub api_key: Option<String>,
    /// Application key, required for monitor management
    pub app_key: Option<String>,
    /// Datadog site, e.g. `datadoghq.eu` or `datadoghq.com`
    pub site: String,
    /// Explicit API base URL; overrides the one derived from `site`
    pub api_url: Option<String>,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Tags added to every series sent over HTTP
    pub tags: Vec<String>,
}

impl DatadogConfig {
    /// Base URL for API requests
    pub fn base_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site.trim()),
        }
    }

    /// Return the API key or a configuration error naming where to set it
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::config("Datadog API key missing; set DD_API_KEY or VANGUARD__DATADOG__API_KEY")
        })
    }

    /// Return the application key or a configuration error naming where to set it
    pub fn require_app_key(&self) -> Result<&str> {
        self.app_key.as_deref().ok_or_else(|| {
            Error::config(
                "Datadog application key missing; set DD_APP_KEY or VANGUARD__DATADOG__APP_KEY",
            )
        })
    }
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            app_key: None,
            site: "datadoghq.eu".to_string(),
            api_url: None,
            timeout: Duration::from_secs(30),
            tags: vec!["app:vanguard".to_string(), "env:production".to_string()],
        }
    }
}

impl fmt::Debug for DatadogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("DatadogConfig")
            .field("api_key", &redact(&self.api_key))
            .field("app_key", &redact(&self.app_key))
            .field("site", &self.site)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .field("tags", &self.tags)
            .finish()
    }
}

/// DogStatsD agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsdConfig {
    /// Agent host
    pub host: String,
    /// Agent UDP port
    pub port: u16,
}

impl StatsdConfig {
    /// `host:port` address of the agent
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8125,
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Pause between iterations
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Where gauges are sent
    pub transport: Transport,
    /// CPU temperature bounds in degrees Celsius
    pub cpu_temp: SampleRange,
    /// Readiness score bounds in percent
    pub readiness: SampleRange,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            transport: Transport::default(),
            cpu_temp: SampleRange::new(45.0, 70.0),
            readiness: SampleRange::new(60.0, 98.0),
            seed: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = Config::load_with_env(None, env(&[])).unwrap();

        assert_eq!(config.simulator.interval, Duration::from_secs(15));
        assert_eq!(config.simulator.transport, Transport::Statsd);
        assert_eq!(config.simulator.cpu_temp, SampleRange::new(45.0, 70.0));
        assert_eq!(config.simulator.readiness, SampleRange::new(60.0, 98.0));
        assert_eq!(config.datadog.site, "datadoghq.eu");
        assert_eq!(config.statsd.address(), "127.0.0.1:8125");
        assert!(config.datadog.api_key.is_none());
    }

    #[test]
    fn test_missing_credentials_are_config_errors() {
        let config = Config::load_with_env(None, env(&[])).unwrap();

        assert!(matches!(config.datadog.require_api_key(), Err(Error::Config(_))));
        assert!(matches!(config.datadog.require_app_key(), Err(Error::Config(_))));
    }

    #[test]
    fn test_dd_env_variables() {
        let config = Config::load_with_env(
            None,
            env(&[
                ("DD_API_KEY", "api-123"),
                ("DD_APP_KEY", "app-456"),
                ("DD_SITE", "datadoghq.com"),
            ]),
        )
        .unwrap();

        assert_eq!(config.datadog.require_api_key().unwrap(), "api-123");
        assert_eq!(config.datadog.require_app_key().unwrap(), "app-456");
        assert_eq!(config.datadog.base_url(), "https://api.datadoghq.com");
    }

    #[test]
    fn test_blank_dd_key_is_ignored() {
        let config = Config::load_with_env(None, env(&[("DD_API_KEY", "  ")])).unwrap();
        assert!(config.datadog.api_key.is_none());
    }

    #[test]
    fn test_prefixed_env_overrides() {
        let config = Config::load_with_env(
            None,
            env(&[
                ("VANGUARD__SIMULATOR__INTERVAL", "5s"),
                ("VANGUARD__STATSD__PORT", "9125"),
                ("VANGUARD__SIMULATOR__TRANSPORT", "log"),
            ]),
        )
        .unwrap();

        assert_eq!(config.simulator.interval, Duration::from_secs(5));
        assert_eq!(config.statsd.port, 9125);
        assert_eq!(config.simulator.transport, Transport::Log);
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[datadog]
api_url = "http://localhost:9000/"

[simulator]
interval = "1m"
seed = 7

[simulator.cpu_temp]
min = 30.0
max = 40.0
"#
        )
        .unwrap();

        let config = Config::load_with_env(Some(file.path()), env(&[])).unwrap();

        assert_eq!(config.simulator.interval, Duration::from_secs(60));
        assert_eq!(config.simulator.seed, Some(7));
        assert_eq!(config.simulator.cpu_temp, SampleRange::new(30.0, 40.0));
        assert_eq!(config.simulator.readiness, SampleRange::new(60.0, 98.0));
        assert_eq!(config.datadog.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result =
            Config::load_with_env(Some(Path::new("/nonexistent/vanguard.toml")), env(&[]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = Config::load_with_env(
            None,
            env(&[
                ("VANGUARD__SIMULATOR__READINESS__MIN", "99"),
                ("VANGUARD__SIMULATOR__READINESS__MAX", "10"),
            ]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_overflowing_range_rejected() {
        let result = Config::load_with_env(
            None,
            env(&[
                ("VANGUARD__SIMULATOR__CPU_TEMP__MIN", "-1e308"),
                ("VANGUARD__SIMULATOR__CPU_TEMP__MAX", "1e308"),
            ]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_environment_coordinates() {
        let config = Config::load_with_env(
            None,
            env(&[
                ("VANGUARD__ENVIRONMENT__LATITUDE", "53.4808"),
                ("VANGUARD__ENVIRONMENT__LONGITUDE", "-2.2426"),
            ]),
        )
        .unwrap();
        assert_eq!(config.environment.latitude, 53.4808);
        assert_eq!(config.environment.longitude, -2.2426);

        let result =
            Config::load_with_env(None, env(&[("VANGUARD__ENVIRONMENT__LATITUDE", "91")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let datadog = DatadogConfig {
            api_key: Some("super-secret".to_string()),
            ..DatadogConfig::default()
        };
        let rendered = format!("{datadog:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
