//! API client for communicating with the forecast agent

use anyhow::{Context, Result};
use breathe_lib::health::{HealthResponse, ReadinessResponse};
use breathe_lib::models::{Anchor, CalibratedDay, MetricSample, NetworkRate};
use breathe_lib::pollutant::PollutantReadings;
use breathe_lib::store::StoreStats;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Non-success response from the agent
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// API client for the forecast agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Make a GET request; non-2xx responses become [`ApiError`]
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path, query)?)
            .send()
            .await
            .context("Failed to send request")?;

        decode(response).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path, &[])?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        decode(response).await
    }

    /// GET that returns the body whatever the status (health probes answer 503 with JSON)
    pub async fn probe<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self
            .client
            .get(self.url(path, &[])?)
            .send()
            .await
            .context("Failed to send request")?;
        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn forecast(&self, city: &str) -> Result<Forecast> {
        self.get(&format!("api/v1/forecast/{}", city), &[]).await
    }

    pub async fn risks(&self, city: &str) -> Result<Risks> {
        self.get(&format!("api/v1/cities/{}/risks", city), &[]).await
    }

    pub async fn push_observation(
        &self,
        city: &str,
        aqi: f64,
        observed_at: Option<DateTime<Utc>>,
    ) -> Result<ObservationReceipt> {
        let body = ObservationRequest { aqi, observed_at };
        self.post(&format!("api/v1/observations/{}", city), &body).await
    }

    pub async fn samples(&self, since: Option<DateTime<Utc>>) -> Result<Vec<MetricSample>> {
        self.get("api/v1/monitor/samples", &since_query(since)).await
    }

    pub async fn network(&self, since: Option<DateTime<Utc>>) -> Result<Vec<NetworkRate>> {
        self.get("api/v1/monitor/network", &since_query(since)).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.get("api/v1/monitor/stats", &[]).await
    }

    pub async fn health(&self) -> Result<(StatusCode, HealthResponse)> {
        self.probe("healthz").await
    }

    pub async fn readiness(&self) -> Result<(StatusCode, ReadinessResponse)> {
        self.probe("readyz").await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        return Err(ApiError { status, message }.into());
    }

    response.json().await.context("Failed to parse response")
}

fn since_query(since: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
    since
        .map(|t| {
            vec![(
                "since",
                t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            )]
        })
        .unwrap_or_default()
}

// API response types not shared with breathe-lib

/// Forecast as served by the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub entity_id: String,
    pub generated_at: DateTime<Utc>,
    pub anchor_used: Option<Anchor>,
    pub model_error: f64,
    pub confidence: f64,
    pub days: Vec<CalibratedDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_confidence_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risks {
    pub city: String,
    pub pollutants: PollutantReadings,
    pub advisories: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ObservationRequest {
    aqi: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationReceipt {
    pub accepted: bool,
    pub anchor: Anchor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathe_lib::{ComponentStatus, RiskCategory};

    const FORECAST: &str = r#"{
        "entity_id": "delhi",
        "generated_at": "2024-11-15T08:00:00Z",
        "anchor_used": {"entity_id": "delhi", "observed_at": "2024-11-15T07:00:00Z", "aqi_value": 150.0},
        "model_error": 20.0,
        "confidence": 0.86,
        "days": [
            {"day_offset": 0, "raw_value": 120.0, "corrected_value": 132.0, "blend_weight": 0.4,
             "category": "moderate", "advisory": "Breathing discomfort"}
        ]
    }"#;

    #[tokio::test]
    async fn test_forecast_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/forecast/delhi")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(FORECAST)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let forecast = client.forecast("delhi").await.unwrap();

        mock.assert_async().await;
        assert_eq!(forecast.days.len(), 1);
        assert_eq!(forecast.days[0].category, RiskCategory::Moderate);
        assert!(forecast.low_confidence_reason.is_none());
    }

    #[tokio::test]
    async fn test_error_body_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/forecast/atlantis")
            .with_status(404)
            .with_body(r#"{"error": "No trained model available for atlantis"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.forecast("atlantis").await.unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_err.status, StatusCode::NOT_FOUND);
        assert!(api_err.message.contains("atlantis"));
    }

    #[tokio::test]
    async fn test_push_observation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/observations/delhi")
            .match_body(mockito::Matcher::Json(serde_json::json!({ "aqi": 180.0 })))
            .with_status(202)
            .with_body(
                r#"{"accepted": true, "anchor": {"entity_id": "delhi", "observed_at": "2024-11-15T08:00:00Z", "aqi_value": 180.0}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let receipt = client.push_observation("delhi", 180.0, None).await.unwrap();

        mock.assert_async().await;
        assert!(receipt.accepted);
        assert_eq!(receipt.anchor.aqi_value, 180.0);
    }

    #[tokio::test]
    async fn test_since_is_sent_as_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/monitor/samples")
            .match_query(mockito::Matcher::UrlEncoded(
                "since".into(),
                "2024-11-15T08:00:00.000Z".into(),
            ))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let since = "2024-11-15T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let samples = client.samples(Some(since)).await.unwrap();

        mock.assert_async().await;
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_probe_keeps_unhealthy_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(r#"{"status": "unhealthy", "components": {}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, health) = client.health().await.unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }
}
