// Agronomy service - Use cases behind the dashboard views
use crate::application::aggregator::{Aggregation, DeviceFailure, MultiDeviceAggregator};
use crate::application::device_directory::DeviceDirectory;
use crate::application::errors::AuthError;
use crate::domain::battery::{BatteryStatus, sort_by_level};
use crate::domain::classification::{SensorStatus, ThresholdTable};
use crate::domain::daily_profile::{PeriodMean, period_means};
use crate::domain::device::DeviceListing;
use crate::domain::gauge::Gauge;
use crate::domain::risk::{RiskComponents, RiskPolicy};
use crate::domain::telemetry::{LatestReading, TelemetryPoint, TimeWindow, latest_per_key};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query defaults taken from configuration.
#[derive(Debug, Clone)]
pub struct QueryDefaults {
    pub keys: Vec<String>,
    pub limit: u32,
    pub days_back: u32,
    pub battery_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub key: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub status: SensorStatus,
    pub gauge: Gauge,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub readings: Vec<SensorReading>,
    pub failures: Vec<DeviceFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyProfile {
    pub device_id: String,
    pub key: String,
    pub periods: Vec<PeriodMean>,
    pub failures: Vec<DeviceFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatteryOverview {
    pub batteries: Vec<BatteryStatus>,
    /// Devices that answered but have never reported a battery level.
    pub without_data: Vec<String>,
    pub unavailable: Vec<DeviceFailure>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetRisk {
    pub reporting_devices: usize,
    pub averages: BTreeMap<String, f64>,
    pub risk: Option<RiskComponents>,
    /// Why `risk` is missing, when it is.
    pub risk_unavailable: Option<String>,
    pub failures: Vec<DeviceFailure>,
    pub truncated: bool,
}

#[derive(Clone)]
pub struct AgronomyService {
    directory: DeviceDirectory,
    aggregator: MultiDeviceAggregator,
    thresholds: Arc<ThresholdTable>,
    risk_policy: Arc<RiskPolicy>,
    defaults: QueryDefaults,
}

impl AgronomyService {
    pub fn new(
        directory: DeviceDirectory,
        aggregator: MultiDeviceAggregator,
        thresholds: Arc<ThresholdTable>,
        risk_policy: Arc<RiskPolicy>,
        defaults: QueryDefaults,
    ) -> Self {
        Self {
            directory,
            aggregator,
            thresholds,
            risk_policy,
            defaults,
        }
    }

    pub async fn list_devices(&self) -> Result<DeviceListing, AuthError> {
        self.directory.list_devices().await
    }

    pub async fn device_telemetry(&self, device_id: &str, days: Option<u32>) -> Aggregation {
        let window = self.window(days);
        self.aggregator
            .aggregate(
                &[device_id.to_string()],
                &window,
                &self.defaults.keys,
                self.defaults.limit,
            )
            .await
    }

    /// Latest value of every key with its classification and gauge.
    pub async fn device_status(&self, device_id: &str, days: Option<u32>) -> DeviceStatus {
        let telemetry = self.device_telemetry(device_id, days).await;
        let readings = latest_per_key(&telemetry.points)
            .into_values()
            .map(|point| self.reading(point))
            .collect();

        DeviceStatus {
            device_id: device_id.to_string(),
            readings,
            failures: telemetry.failures,
        }
    }

    pub async fn daily_profile(&self, device_id: &str, key: &str, days: Option<u32>) -> DailyProfile {
        let telemetry = self.device_telemetry(device_id, days).await;
        DailyProfile {
            device_id: device_id.to_string(),
            key: key.to_string(),
            periods: period_means(&telemetry.points, key),
            failures: telemetry.failures,
        }
    }

    pub async fn battery_overview(&self) -> Result<BatteryOverview, AuthError> {
        let listing = self.directory.list_devices().await?;
        let readings = self
            .aggregator
            .latest_readings(&listing.ids(), &self.defaults.battery_key)
            .await;

        let now = Utc::now();
        let mut overview = BatteryOverview {
            batteries: Vec::new(),
            without_data: Vec::new(),
            unavailable: Vec::new(),
            truncated: listing.truncated,
        };

        for (device_id, reading) in readings {
            match reading {
                LatestReading::Found { point } => {
                    let name = listing.name_of(&device_id).unwrap_or(&device_id).to_string();
                    overview
                        .batteries
                        .push(BatteryStatus::from_point(&point, name, now));
                }
                LatestReading::NotFound => overview.without_data.push(device_id),
                LatestReading::TransientError { reason } => {
                    overview.unavailable.push(DeviceFailure { device_id, reason })
                }
            }
        }

        sort_by_level(&mut overview.batteries);
        overview.without_data.sort();
        Ok(overview)
    }

    /// Risk score from each sensor's latest value averaged across devices.
    pub async fn fleet_risk(&self, days: Option<u32>) -> Result<FleetRisk, AuthError> {
        let listing = self.directory.list_devices().await?;
        let window = self.window(days);
        let keys: Vec<String> = self
            .risk_policy
            .sensor_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();

        let telemetry = self
            .aggregator
            .aggregate(&listing.ids(), &window, &keys, self.defaults.limit)
            .await;

        let mut per_device: BTreeMap<&str, Vec<&TelemetryPoint>> = BTreeMap::new();
        for point in &telemetry.points {
            per_device.entry(point.device_id.as_str()).or_default().push(point);
        }

        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for points in per_device.values() {
            for (key, point) in latest_per_key(points.iter().copied()) {
                let entry = sums.entry(key).or_insert((0.0, 0));
                entry.0 += point.value;
                entry.1 += 1;
            }
        }
        let averages: BTreeMap<String, f64> = sums
            .into_iter()
            .map(|(key, (sum, n))| (key, sum / n as f64))
            .collect();

        let (risk, risk_unavailable) = match self.risk_policy.assess(&self.thresholds, &averages) {
            Ok(components) => (Some(components), None),
            Err(err) => {
                tracing::warn!("Risk index unavailable: {}", err);
                (None, Some(err.to_string()))
            }
        };

        Ok(FleetRisk {
            reporting_devices: per_device.len(),
            averages,
            risk,
            risk_unavailable,
            failures: telemetry.failures,
            truncated: listing.truncated,
        })
    }

    fn reading(&self, point: TelemetryPoint) -> SensorReading {
        let classification = self.thresholds.classify(point.value, &point.key);
        SensorReading {
            gauge: Gauge::from_reading(point.value),
            status: classification.status,
            value: point.value,
            timestamp: point.timestamp,
            key: point.key,
        }
    }

    fn window(&self, days: Option<u32>) -> TimeWindow {
        TimeWindow::last_days(days.unwrap_or(self.defaults.days_back))
    }
}
