// Day-period profile of a sensor series
use super::telemetry::TelemetryPoint;
use chrono::{NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Night,
}

impl DayPeriod {
    /// Morning is [6, 12), afternoon [12, 18), everything else is night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => DayPeriod::Morning,
            12..=17 => DayPeriod::Afternoon,
            _ => DayPeriod::Night,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMean {
    pub date: NaiveDate,
    pub period: DayPeriod,
    pub mean: f64,
    pub samples: usize,
}

/// Mean of `key` per (UTC date, day period), ordered by date then period.
pub fn period_means(points: &[TelemetryPoint], key: &str) -> Vec<PeriodMean> {
    let mut buckets: BTreeMap<(NaiveDate, DayPeriod), (f64, usize)> = BTreeMap::new();

    for point in points.iter().filter(|p| p.key == key) {
        let period = DayPeriod::from_hour(point.timestamp.hour());
        let bucket = buckets
            .entry((point.timestamp.date_naive(), period))
            .or_insert((0.0, 0));
        bucket.0 += point.value;
        bucket.1 += 1;
    }

    buckets
        .into_iter()
        .map(|((date, period), (sum, samples))| PeriodMean {
            date,
            period,
            mean: sum / samples as f64,
            samples,
        })
        .collect()
}
