// Battery freshness model
use super::telemetry::TelemetryPoint;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How long ago a device last reported its battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Under one hour.
    Fresh,
    /// One to twelve hours.
    Lagging,
    /// Twelve hours to one day.
    Stale,
    /// One day or more.
    Offline,
}

impl Freshness {
    pub fn from_age(age: Duration) -> Self {
        if age >= Duration::days(1) {
            Freshness::Offline
        } else if age >= Duration::hours(12) {
            Freshness::Stale
        } else if age >= Duration::hours(1) {
            Freshness::Lagging
        } else {
            Freshness::Fresh
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryStatus {
    pub device_id: String,
    pub device_name: String,
    /// Battery level as reported, a fraction in [0, 1].
    pub level: f64,
    pub percent: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reported_at: DateTime<Utc>,
    pub freshness: Freshness,
}

impl BatteryStatus {
    pub fn from_point(point: &TelemetryPoint, device_name: String, now: DateTime<Utc>) -> Self {
        Self {
            device_id: point.device_id.clone(),
            device_name,
            level: point.value,
            percent: point.value * 100.0,
            reported_at: point.timestamp,
            freshness: Freshness::from_age(now - point.timestamp),
        }
    }
}

/// Lowest battery first.
pub fn sort_by_level(statuses: &mut [BatteryStatus]) {
    statuses.sort_by(|a, b| a.level.total_cmp(&b.level));
}
