//! AQICN (World Air Quality Index) live observation source
//!
//! Reads `{base}/feed/{city}/?token=...`. Every failure is logged and turned
//! into "no observation"; the caller then serves the raw model forecast.

use anyhow::{Context, Result};
use async_trait::async_trait;
use breathe_lib::health::{components, HealthRegistry};
use breathe_lib::models::Anchor;
use breathe_lib::observation::LiveObservationSource;
use breathe_lib::pollutant::{aqi_from_pollutants, Pollutant, PollutantReadings};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct FeedResponse {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct FeedData {
    /// Number, or "-" when the station reports nothing
    #[serde(default)]
    aqi: serde_json::Value,
    #[serde(default)]
    time: Option<FeedTime>,
    #[serde(default)]
    iaqi: BTreeMap<String, FeedValue>,
}

#[derive(Debug, Deserialize)]
struct FeedTime {
    #[serde(default)]
    iso: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedValue {
    #[serde(default)]
    v: serde_json::Value,
}

/// One station reading, parsed
#[derive(Debug, Clone, PartialEq)]
pub struct StationReading {
    pub aqi: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub pollutants: PollutantReadings,
}

impl StationReading {
    /// Reported composite AQI, or one derived from the pollutant readings
    pub fn effective_aqi(&self) -> Option<f64> {
        self.aqi
            .or_else(|| aqi_from_pollutants(&self.pollutants).map(f64::from))
    }
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse a feed body. `Ok(None)` means the station is unknown to AQICN.
pub fn parse_feed(body: &str, fetched_at: DateTime<Utc>) -> Result<Option<StationReading>> {
    let response: FeedResponse = serde_json::from_str(body).context("Malformed AQICN response")?;

    match response.status.as_str() {
        "ok" => {}
        "error" => {
            let reason = response.data.as_str().unwrap_or("unknown error");
            if reason.contains("Unknown station") {
                return Ok(None);
            }
            anyhow::bail!("AQICN returned an error: {}", reason);
        }
        other => anyhow::bail!("Unexpected AQICN status: {}", other),
    }

    let data: FeedData =
        serde_json::from_value(response.data).context("Malformed AQICN station data")?;

    let observed_at = data
        .time
        .and_then(|t| t.iso)
        .and_then(|iso| DateTime::parse_from_rfc3339(&iso).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(fetched_at);

    let pollutants = data
        .iaqi
        .iter()
        .filter_map(|(key, value)| Some((Pollutant::from_key(key)?, as_number(&value.v)?)))
        .collect();

    Ok(Some(StationReading {
        aqi: as_number(&data.aqi),
        observed_at,
        pollutants,
    }))
}

/// Station name AQICN understands: "Delhi, India" becomes "Delhi"
fn station_query(entity_id: &str) -> &str {
    entity_id.split(',').next().unwrap_or(entity_id).trim()
}

pub struct AqicnClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
    health: Option<HealthRegistry>,
}

impl AqicnClient {
    /// `timeout` bounds each lookup end to end
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("Invalid AQICN base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
            health: None,
        })
    }

    /// Report lookup failures as a degraded observation component
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    fn feed_url(&self, entity_id: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("feed/{}/", station_query(entity_id)))
            .context("Invalid station name")?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }

    async fn try_fetch(&self, entity_id: &str) -> Result<Option<StationReading>> {
        let url = self.feed_url(entity_id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("AQICN request failed")?
            .error_for_status()
            .context("AQICN returned an HTTP error")?;
        let body = response.text().await.context("Failed to read AQICN body")?;
        parse_feed(&body, Utc::now())
    }

    /// Latest station reading, or None on any failure
    pub async fn fetch(&self, entity_id: &str) -> Option<StationReading> {
        match self.try_fetch(entity_id).await {
            Ok(reading) => {
                if let Some(health) = &self.health {
                    health.set_healthy(components::OBSERVATIONS).await;
                }
                if reading.is_none() {
                    info!(entity_id = %entity_id, "AQICN does not know this station");
                }
                reading
            }
            Err(e) => {
                warn!(entity_id = %entity_id, error = %format!("{:#}", e), "AQICN lookup failed");
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::OBSERVATIONS, format!("{:#}", e))
                        .await;
                }
                None
            }
        }
    }
}

#[async_trait]
impl LiveObservationSource for AqicnClient {
    async fn latest(&self, entity_id: &str) -> Option<Anchor> {
        let reading = self.fetch(entity_id).await?;
        let Some(aqi) = reading.effective_aqi() else {
            debug!(entity_id = %entity_id, "Station reported no usable AQI");
            return None;
        };
        Some(Anchor::new(entity_id, reading.observed_at, aqi))
    }

    async fn pollutants(&self, entity_id: &str) -> Option<PollutantReadings> {
        self.fetch(entity_id)
            .await
            .map(|reading| reading.pollutants)
            .filter(|pollutants| !pollutants.is_empty())
    }

    fn name(&self) -> &'static str {
        "aqicn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 15, 10, 0, 0).unwrap()
    }

    const DELHI_FEED: &str = r#"{
        "status": "ok",
        "data": {
            "aqi": 187,
            "time": {"s": "2024-11-15 14:00:00", "iso": "2024-11-15T14:00:00+05:30"},
            "iaqi": {
                "pm25": {"v": 187},
                "pm10": {"v": 120},
                "t": {"v": 21.5},
                "no2": {"v": 35.2}
            }
        }
    }"#;

    #[test]
    fn test_parse_ok_feed() {
        let reading = parse_feed(DELHI_FEED, fetched_at()).unwrap().unwrap();
        assert_eq!(reading.aqi, Some(187.0));
        assert_eq!(
            reading.observed_at,
            Utc.with_ymd_and_hms(2024, 11, 15, 8, 30, 0).unwrap()
        );
        // temperature is not a pollutant
        assert_eq!(reading.pollutants.len(), 3);
        assert_eq!(reading.pollutants[&Pollutant::Pm25], 187.0);
    }

    #[test]
    fn test_missing_aqi_falls_back_to_pollutants() {
        let body = r#"{"status": "ok", "data": {"aqi": "-", "iaqi": {"pm10": {"v": 75}}}}"#;
        let reading = parse_feed(body, fetched_at()).unwrap().unwrap();
        assert_eq!(reading.aqi, None);
        assert_eq!(reading.observed_at, fetched_at());
        assert_eq!(reading.effective_aqi(), Some(75.0));
    }

    #[test]
    fn test_nothing_usable() {
        let body = r#"{"status": "ok", "data": {"aqi": "-"}}"#;
        let reading = parse_feed(body, fetched_at()).unwrap().unwrap();
        assert_eq!(reading.effective_aqi(), None);
    }

    #[test]
    fn test_unknown_station_is_not_an_error() {
        let body = r#"{"status": "error", "data": "Unknown station"}"#;
        assert!(parse_feed(body, fetched_at()).unwrap().is_none());
    }

    #[test]
    fn test_error_status() {
        let body = r#"{"status": "error", "data": "Invalid key"}"#;
        assert!(parse_feed(body, fetched_at()).is_err());
        assert!(parse_feed("<html>", fetched_at()).is_err());
    }

    #[test]
    fn test_feed_url() {
        let client =
            AqicnClient::new("https://api.waqi.info", "secret", Duration::from_secs(5)).unwrap();
        let url = client.feed_url("Delhi, India").unwrap();
        assert_eq!(url.as_str(), "https://api.waqi.info/feed/Delhi/?token=secret");
    }

    #[tokio::test]
    async fn test_unreachable_source_degrades() {
        let health = HealthRegistry::new();
        health.register(components::OBSERVATIONS).await;
        // Port 9 (discard) on localhost is closed in test environments
        let client = AqicnClient::new("http://127.0.0.1:9", "t", Duration::from_millis(500))
            .unwrap()
            .with_health(health.clone());

        assert!(client.latest("delhi").await.is_none());
        assert_eq!(
            health.status_of(components::OBSERVATIONS).await,
            Some(breathe_lib::ComponentStatus::Degraded)
        );
    }
}
