// Telemetry data domain models
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One timestamped scalar reading for a sensor key on one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPoint {
    pub device_id: String,
    pub key: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TelemetryPoint {
    pub fn new(device_id: String, key: String, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            device_id,
            key,
            timestamp,
            value,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// A raw `{ts, value}` entry as the platform returns it. Both fields are kept
/// as untyped JSON so the parser can report exactly what was wrong with them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Per-key arrays of raw samples, keyed by telemetry key.
pub type RawTelemetry = BTreeMap<String, Vec<RawSample>>;

/// Closed query window in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    lookback_days: Option<u32>,
}

impl TimeWindow {
    /// Window ending now and reaching `days` back.
    pub fn last_days(days: u32) -> Self {
        Self::last_days_from(Utc::now(), days)
    }

    /// Lookbacks reaching past the earliest representable instant start there.
    pub fn last_days_from(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
            lookback_days: Some(days),
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            lookback_days: None,
        }
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// Stable label for cache keys. Relative windows are labelled by their
    /// lookback so repeated "last N days" queries share one entry for the TTL.
    pub fn cache_tag(&self) -> String {
        match self.lookback_days {
            Some(days) => format!("last{}d", days),
            None => format!("{}-{}", self.start_ms(), self.end_ms()),
        }
    }
}

/// Outcome of a most-recent-point lookup. `NotFound` means the platform
/// answered and has no data for the key; `TransientError` means it could not
/// be asked, so a retry may succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LatestReading {
    Found { point: TelemetryPoint },
    NotFound,
    TransientError { reason: String },
}

impl LatestReading {
    pub fn is_transient(&self) -> bool {
        matches!(self, LatestReading::TransientError { .. })
    }
}

/// Most recent point of every key among `points`.
pub fn latest_per_key<'a>(
    points: impl IntoIterator<Item = &'a TelemetryPoint>,
) -> BTreeMap<String, TelemetryPoint> {
    let mut latest: BTreeMap<String, TelemetryPoint> = BTreeMap::new();
    for point in points {
        match latest.get(&point.key) {
            Some(existing) if existing.timestamp > point.timestamp => {}
            _ => {
                latest.insert(point.key.clone(), point.clone());
            }
        }
    }
    latest
}
