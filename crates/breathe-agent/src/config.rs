//! Agent configuration

use anyhow::{Context, Result};
use breathe_lib::calibration::{
    BlendCurve, CalibrationConfig, DEFAULT_CONFIDENCE_ERROR_SCALE, DEFAULT_DECAY,
    DEFAULT_HORIZON_DAYS, DEFAULT_W_MAX, DEFAULT_W_MIN,
};
use breathe_lib::history::DEFAULT_RETENTION_DAYS;
use breathe_lib::sampler::SamplerConfig;
use breathe_lib::store::{StoreConfig, DEFAULT_STORE_CAPACITY};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Config file consulted when `BREATHE_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "breathe.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name attached to structured log events
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory of `<city>.json` model files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Directory of `<city>.json` daily AQI history files
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: usize,

    /// AQICN API token; without one, anchors must be pushed over the API
    #[serde(default)]
    pub aqicn_token: Option<String>,

    #[serde(default = "default_aqicn_base_url")]
    pub aqicn_base_url: String,

    /// Timeout for one live observation lookup
    #[serde(default = "default_observation_timeout")]
    pub observation_timeout_secs: u64,

    #[serde(default = "default_sample_period")]
    pub sample_period_ms: u64,

    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,

    #[serde(default)]
    pub calibration: CalibrationSettings,
}

/// Calibration parameters as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationSettings {
    #[serde(default)]
    pub blend: BlendCurve,
    #[serde(default = "default_w_min")]
    pub w_min: f64,
    #[serde(default = "default_w_max")]
    pub w_max: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
    #[serde(default = "default_anchor_freshness_hours")]
    pub anchor_freshness_hours: u64,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: usize,
    #[serde(default = "default_error_scale")]
    pub error_scale: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            blend: BlendCurve::default(),
            w_min: default_w_min(),
            w_max: default_w_max(),
            decay: default_decay(),
            anchor_freshness_hours: default_anchor_freshness_hours(),
            horizon_days: default_horizon_days(),
            error_scale: default_error_scale(),
        }
    }
}

impl TryFrom<&CalibrationSettings> for CalibrationConfig {
    type Error = anyhow::Error;

    fn try_from(settings: &CalibrationSettings) -> Result<Self> {
        let freshness_secs = settings
            .anchor_freshness_hours
            .checked_mul(3600)
            .with_context(|| {
                format!(
                    "anchor_freshness_hours out of range: {}",
                    settings.anchor_freshness_hours
                )
            })?;
        Ok(CalibrationConfig {
            blend: settings.blend,
            w_min: settings.w_min,
            w_max: settings.w_max,
            decay: settings.decay,
            anchor_freshness: Duration::from_secs(freshness_secs),
            horizon_days: settings.horizon_days,
            confidence_error_scale: settings.error_scale,
        })
    }
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("data/history")
}

fn default_history_retention_days() -> usize {
    DEFAULT_RETENTION_DAYS
}

fn default_aqicn_base_url() -> String {
    "https://api.waqi.info".to_string()
}

fn default_observation_timeout() -> u64 {
    10
}

fn default_sample_period() -> u64 {
    2000
}

fn default_store_capacity() -> usize {
    DEFAULT_STORE_CAPACITY
}

fn default_w_min() -> f64 {
    DEFAULT_W_MIN
}

fn default_w_max() -> f64 {
    DEFAULT_W_MAX
}

fn default_decay() -> f64 {
    DEFAULT_DECAY
}

fn default_anchor_freshness_hours() -> u64 {
    24
}

fn default_horizon_days() -> usize {
    DEFAULT_HORIZON_DAYS
}

fn default_error_scale() -> f64 {
    DEFAULT_CONFIDENCE_ERROR_SCALE
}

impl AgentConfig {
    /// Load from `BREATHE_CONFIG` (or `breathe.toml`) overlaid with `BREATHE_*`
    /// environment variables. Nested keys use `__`, e.g. `BREATHE_CALIBRATION__DECAY`.
    pub fn load() -> Result<Self> {
        let path = std::env::var("BREATHE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BREATHE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        agent.validate()?;
        Ok(agent)
    }

    /// Reject values the engine would refuse later
    pub fn validate(&self) -> Result<()> {
        self.calibration_config()?
            .validate()
            .context("Invalid calibration settings")?;
        self.sampler_config()
            .validate()
            .context("Invalid sampler settings")?;
        if self.store_capacity == 0 {
            anyhow::bail!("store_capacity must be at least 1");
        }
        if self.observation_timeout_secs == 0 {
            anyhow::bail!("observation_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn calibration_config(&self) -> Result<CalibrationConfig> {
        CalibrationConfig::try_from(&self.calibration).context("Invalid calibration settings")
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            period: Duration::from_millis(self.sample_period_ms),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.store_capacity,
        }
    }

    pub fn observation_timeout(&self) -> Duration {
        Duration::from_secs(self.observation_timeout_secs)
    }

    /// Token, if one is configured and non-empty
    pub fn aqicn_token(&self) -> Option<&str> {
        self.aqicn_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}
