//! Datadog API client

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::config::DatadogConfig;
use crate::error::{Error, Result};
use crate::models::{Gauge, MonitorDefinition};
use crate::sink::MetricSink;

use super::payload::{CreatedMonitor, EventPayload, SeriesPayload, ValidateResponse};

/// Authenticated client for the Datadog v1 API
pub struct DatadogClient {
    client: Client,
    base_url: String,
    api_key: String,
    config: DatadogConfig,
}

impl DatadogClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &DatadogConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key,
            config: config.clone(),
        })
    }

    /// API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("DD-API-KEY", &self.api_key);

        if let Some(app_key) = &self.config.app_key {
            request = request.header("DD-APPLICATION-KEY", app_key);
        }

        request
    }

    /// Turn a non-success response into an [`Error::Api`]
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::api(status.as_u16(), body))
    }

    /// Submit gauges through the series endpoint
    pub async fn submit_series(&self, gauges: &[Gauge]) -> Result<()> {
        let payload = SeriesPayload::from_gauges(gauges, &self.config.tags);

        let response = self
            .request(Method::POST, "/api/v1/series")
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response).await?;

        debug!(count = gauges.len(), status = %response.status(), "Series accepted");
        Ok(())
    }

    /// Post an event to the event stream
    pub async fn post_event(&self, event: &EventPayload) -> Result<()> {
        let response = self
            .request(Method::POST, "/api/v1/events")
            .json(event)
            .send()
            .await?;
        Self::check(response).await?;

        info!(title = %event.title, alert_type = ?event.alert_type, "Event created");
        Ok(())
    }

    /// Ask Datadog whether the API key is valid
    pub async fn validate(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/v1/validate", self.base_url))
            .header("DD-API-KEY", &self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("Datadog rejected the API key");
            return Ok(false);
        }

        let body: ValidateResponse = Self::check(response).await?.json().await?;
        Ok(body.valid)
    }

    /// Create a monitor and return its id
    pub async fn create_monitor(&self, monitor: &MonitorDefinition) -> Result<u64> {
        self.config.require_app_key()?;

        let mut body = monitor.clone();
        body.id = None;

        let response = self
            .request(Method::POST, "/api/v1/monitor")
            .json(&body)
            .send()
            .await?;
        let created: CreatedMonitor = Self::check(response).await?.json().await?;

        info!(monitor_id = created.id, name = %monitor.name, "Monitor created");
        Ok(created.id)
    }
}

#[async_trait::async_trait]
impl MetricSink for DatadogClient {
    async fn gauge(&self, gauge: &Gauge) -> Result<()> {
        self.submit_series(std::slice::from_ref(gauge)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datadog::AlertType;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, app_key: Option<&str>) -> DatadogClient {
        let config = DatadogConfig {
            api_key: Some("test-api-key".to_string()),
            app_key: app_key.map(String::from),
            api_url: Some(server.uri()),
            ..DatadogConfig::default()
        };
        DatadogClient::new(&config).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let result = DatadogClient::new(&DatadogConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_from_site() {
        let config = DatadogConfig {
            api_key: Some("k".to_string()),
            site: "us5.datadoghq.com".to_string(),
            ..DatadogConfig::default()
        };
        let client = DatadogClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://api.us5.datadoghq.com");
    }

    #[tokio::test]
    async fn test_gauge_posts_series() {
        let server = MockServer::start().await;
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        Mock::given(method("POST"))
            .and(path("/api/v1/series"))
            .and(header("DD-API-KEY", "test-api-key"))
            .and(body_json(json!({
                "series": [{
                    "metric": "vanguard.system_readiness",
                    "points": [[1_700_000_000, 88.5]],
                    "type": "gauge",
                    "tags": ["app:vanguard", "env:production"]
                }]
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        client
            .gauge(&Gauge::new("vanguard.system_readiness", 88.5, ts))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_series_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/series"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .gauge(&Gauge::new("vanguard.pi.cpu_temp", 50.0, Utc::now()))
            .await
            .unwrap_err();

        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "Forbidden");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_post_event_sends_app_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/events"))
            .and(header("DD-APPLICATION-KEY", "test-app-key"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("test-app-key"));
        let event = EventPayload::new("FLOOD ALERT", "52 active warnings", AlertType::Warning);
        client.post_event(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/validate"))
            .and(header_exists("DD-API-KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(client.validate().await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_forbidden_is_false() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/validate"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errors": ["Forbidden"]})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(!client.validate().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_monitor_strips_id() {
        let server = MockServer::start().await;
        let monitor = MonitorDefinition::connectivity_lost().unwrap();

        let mut expected = serde_json::to_value(&monitor).unwrap();
        expected.as_object_mut().unwrap().remove("id");

        Mock::given(method("POST"))
            .and(path("/api/v1/monitor"))
            .and(body_json(expected))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 12345, "name": monitor.name})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("test-app-key"));
        assert_eq!(client.create_monitor(&monitor).await.unwrap(), 12345);
    }

    #[tokio::test]
    async fn test_create_monitor_requires_app_key() {
        let server = MockServer::start().await;
        let client = client_for(&server, None);
        let monitor = MonitorDefinition::connectivity_lost().unwrap();

        let err = client.create_monitor(&monitor).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("DD_APP_KEY"));
    }
}
