// Scripted in-memory platform for service tests
use crate::application::aggregator::MultiDeviceAggregator;
use crate::application::agronomy_service::{AgronomyService, QueryDefaults};
use crate::application::cache::CacheLayer;
use crate::application::device_directory::DeviceDirectory;
use crate::application::errors::PlatformError;
use crate::application::session_manager::SessionManager;
use crate::application::telemetry_fetcher::TelemetryFetcher;
use crate::application::telemetry_platform::{TelemetryPlatform, TimeseriesQuery};
use crate::domain::classification::{Band, ThresholdProfile, ThresholdTable};
use crate::domain::device::{Device, DevicePage};
use crate::domain::risk::RiskPolicy;
use crate::domain::session::{Credentials, Session, TokenPair};
use crate::domain::telemetry::{RawSample, RawTelemetry};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakePlatform {
    pub logins: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub timeseries_calls: AtomicUsize,
    login_error: Option<PlatformError>,
    refresh_error: Option<PlatformError>,
    latency: Duration,
    pages: Vec<Result<DevicePage, PlatformError>>,
    telemetry: HashMap<String, Result<RawTelemetry, PlatformError>>,
    valid_token: Mutex<Option<String>>,
    issued: AtomicUsize,
    queries: Mutex<Vec<TimeseriesQuery>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_login(mut self, err: PlatformError) -> Self {
        self.login_error = Some(err);
        self
    }

    pub fn failing_refresh(mut self, err: PlatformError) -> Self {
        self.refresh_error = Some(err);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_page(mut self, page: Result<DevicePage, PlatformError>) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_telemetry(
        mut self,
        device_id: &str,
        result: Result<RawTelemetry, PlatformError>,
    ) -> Self {
        self.telemetry.insert(device_id.to_string(), result);
        self
    }

    /// Reject every token issued so far.
    pub fn expire_tokens(&self) {
        *self.valid_token.lock().unwrap() = Some("expired".to_string());
    }

    pub fn queries(&self) -> Vec<TimeseriesQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn issue(&self) -> TokenPair {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let tokens = TokenPair {
            access_token: format!("access-{}", n),
            refresh_token: format!("refresh-{}", n),
        };
        *self.valid_token.lock().unwrap() = Some(tokens.access_token.clone());
        tokens
    }

    fn check(&self, token: &str) -> Result<(), PlatformError> {
        match self.valid_token.lock().unwrap().as_deref() {
            Some(valid) if valid != token => {
                Err(PlatformError::Unauthorized("token expired".to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl TelemetryPlatform for FakePlatform {
    async fn login(&self, _credentials: &Credentials) -> Result<TokenPair, PlatformError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        match &self.login_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.issue()),
        }
    }

    async fn refresh(&self, _session: &Session) -> Result<TokenPair, PlatformError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        match &self.refresh_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.issue()),
        }
    }

    async fn device_page(
        &self,
        token: &str,
        _page_size: u32,
        page: u32,
    ) -> Result<DevicePage, PlatformError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check(token)?;
        self.pages
            .get(page as usize)
            .cloned()
            .unwrap_or_else(|| {
                Err(PlatformError::Status {
                    status: 404,
                    message: "no such page".to_string(),
                })
            })
    }

    async fn timeseries(
        &self,
        token: &str,
        query: &TimeseriesQuery,
    ) -> Result<RawTelemetry, PlatformError> {
        self.timeseries_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.check(token)?;
        self.queries.lock().unwrap().push(query.clone());
        self.telemetry
            .get(&query.device_id)
            .cloned()
            .unwrap_or_else(|| Ok(RawTelemetry::new()))
    }
}

pub fn devices(ids: &[&str]) -> Vec<Device> {
    ids.iter()
        .map(|id| Device::new(id.to_string(), format!("Sonda {}", id)))
        .collect()
}

pub fn page(ids: &[&str], has_next: bool) -> Result<DevicePage, PlatformError> {
    Ok(DevicePage {
        devices: devices(ids),
        has_next,
    })
}

pub fn sample(ts: i64, value: &str) -> RawSample {
    RawSample {
        ts: Some(serde_json::json!(ts)),
        value: Some(serde_json::json!(value)),
    }
}

pub fn raw(entries: &[(&str, Vec<RawSample>)]) -> RawTelemetry {
    entries
        .iter()
        .map(|(key, samples)| (key.to_string(), samples.clone()))
        .collect()
}

pub fn credentials() -> Credentials {
    Credentials::new("tenant@example.com".to_string(), "secret".to_string())
}

/// Optimal band flanked by one critical band on each side.
pub fn thresholds() -> ThresholdTable {
    let profile = |lo: f64, hi: f64, floor: f64, ceiling: f64| ThresholdProfile {
        optimal: Band::new(lo, hi).unwrap(),
        caution: vec![],
        critical: vec![
            Band::new(floor, lo - 1.0).unwrap(),
            Band::new(hi + 1.0, ceiling).unwrap(),
        ],
    };
    let mut profiles = BTreeMap::new();
    profiles.insert("humidity".to_string(), profile(25.0, 40.0, 5.0, 60.0));
    profiles.insert("temperature".to_string(), profile(18.0, 26.0, 0.0, 40.0));
    profiles.insert("soil_conductivity".to_string(), profile(200.0, 1200.0, 0.0, 3000.0));
    ThresholdTable::new(profiles)
}

pub fn agronomy_service(platform: &Arc<FakePlatform>) -> AgronomyService {
    let sessions = Arc::new(SessionManager::new(platform.clone(), credentials()));
    let cache = Arc::new(CacheLayer::new());
    let directory = DeviceDirectory::new(
        platform.clone(),
        sessions.clone(),
        cache.clone(),
        100,
        Duration::from_secs(3600),
    );
    let fetcher = TelemetryFetcher::new(platform.clone(), sessions);
    let aggregator = MultiDeviceAggregator::new(fetcher, cache, Duration::from_secs(1800), 4);
    AgronomyService::new(
        directory,
        aggregator,
        Arc::new(thresholds()),
        Arc::new(RiskPolicy::default()),
        QueryDefaults {
            keys: vec![
                "humidity".to_string(),
                "temperature".to_string(),
                "soil_conductivity".to_string(),
            ],
            limit: 500,
            days_back: 60,
            battery_key: "battery".to_string(),
        },
    )
}
