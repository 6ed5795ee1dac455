use crate::domain::classification::ThresholdTable;
use crate::domain::risk::RiskPolicy;
use anyhow::{Context, ensure};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "SOILTEL";
const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub thingsboard: ThingsBoardSettings,
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Deserialize, Clone)]
pub struct ThingsBoardSettings {
    pub base_url: String,
    pub username: String,
    /// Usually supplied through `SOILTEL__THINGSBOARD__PASSWORD`
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ThingsBoardSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingsBoardSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ThingsBoardSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    pub keys: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_battery_key")]
    pub battery_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_device_ttl_secs")]
    pub device_ttl_secs: u64,
    #[serde(default = "default_telemetry_ttl_secs")]
    pub telemetry_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            device_ttl_secs: default_device_ttl_secs(),
            telemetry_ttl_secs: default_telemetry_ttl_secs(),
        }
    }
}

impl CacheSettings {
    pub fn device_ttl(&self) -> Duration {
        Duration::from_secs(self.device_ttl_secs)
    }

    pub fn telemetry_ttl(&self) -> Duration {
        Duration::from_secs(self.telemetry_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_limit() -> u32 {
    500
}

fn default_days_back() -> u32 {
    60
}

fn default_page_size() -> u32 {
    100
}

fn default_max_concurrency() -> usize {
    4
}

fn default_battery_key() -> String {
    "battery".to_string()
}

fn default_device_ttl_secs() -> u64 {
    3600
}

fn default_telemetry_ttl_secs() -> u64 {
    1800
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.thingsboard.base_url.starts_with("http://")
                || self.thingsboard.base_url.starts_with("https://"),
            "thingsboard.base_url must be an http(s) URL, got {:?}",
            self.thingsboard.base_url
        );
        ensure!(!self.thingsboard.username.is_empty(), "thingsboard.username is empty");
        ensure!(
            !self.thingsboard.password.is_empty(),
            "thingsboard.password is empty; set {}__THINGSBOARD__PASSWORD",
            ENV_PREFIX
        );
        ensure!(!self.telemetry.keys.is_empty(), "telemetry.keys is empty");
        ensure!(self.telemetry.limit > 0, "telemetry.limit must be positive");
        ensure!(self.telemetry.page_size > 0, "telemetry.page_size must be positive");
        ensure!(
            self.telemetry.max_concurrency > 0,
            "telemetry.max_concurrency must be positive"
        );
        for (name, secs) in [
            ("cache.device_ttl_secs", self.cache.device_ttl_secs),
            ("cache.telemetry_ttl_secs", self.cache.telemetry_ttl_secs),
        ] {
            ensure!(
                secs <= MAX_CACHE_TTL_SECS,
                "{} must be at most {} seconds, got {}",
                name,
                MAX_CACHE_TTL_SECS,
                secs
            );
        }
        Ok(())
    }
}

/// Classification bands per sensor key plus the risk policy.
#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    pub thresholds: ThresholdTable,
    #[serde(default)]
    pub risk: RiskPolicy,
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/thingsboard"))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

    app_config_from(builder)
}

pub fn load_threshold_config() -> anyhow::Result<ThresholdConfig> {
    let builder =
        config::Config::builder().add_source(config::File::with_name("config/thresholds"));

    threshold_config_from(builder)
}

fn app_config_from(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<AppConfig> {
    let settings: AppConfig = builder
        .build()?
        .try_deserialize()
        .context("Invalid application configuration")?;
    settings.validate()?;

    Ok(settings)
}

fn threshold_config_from(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<ThresholdConfig> {
    let settings: ThresholdConfig = builder
        .build()?
        .try_deserialize()
        .context("Invalid threshold configuration")?;
    settings.risk.validate()?;

    tracing::info!(
        "Loaded threshold profiles for {}",
        settings.thresholds.keys().collect::<Vec<_>>().join(", ")
    );
    for key in settings.risk.sensor_keys() {
        if settings.thresholds.profile(key).is_none() {
            tracing::warn!("No threshold profile for risk sensor key {}", key);
        }
    }

    Ok(settings)
}
