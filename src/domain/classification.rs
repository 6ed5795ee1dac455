// Sensor classification against agronomic threshold bands
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("invalid band [{lo}, {hi}]: bounds must be finite and lo <= hi")]
    InvalidBand { lo: f64, hi: f64 },
}

/// Closed interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Band {
    lo: f64,
    hi: f64,
}

impl Band {
    pub fn new(lo: f64, hi: f64) -> Result<Self, ThresholdError> {
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(ThresholdError::InvalidBand { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

impl TryFrom<[f64; 2]> for Band {
    type Error = ThresholdError;

    fn try_from([lo, hi]: [f64; 2]) -> Result<Self, Self::Error> {
        Band::new(lo, hi)
    }
}

impl From<Band> for [f64; 2] {
    fn from(band: Band) -> Self {
        [band.lo, band.hi]
    }
}

/// Bands for one sensor key. Caution and critical bands may be scattered on
/// both sides of the optimal band and need not cover every value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThresholdProfile {
    pub optimal: Band,
    #[serde(default)]
    pub caution: Vec<Band>,
    #[serde(default)]
    pub critical: Vec<Band>,
}

impl ThresholdProfile {
    pub fn status_of(&self, value: f64) -> SensorStatus {
        if self.optimal.contains(value) {
            SensorStatus::Optimal
        } else if self.caution.iter().any(|b| b.contains(value)) {
            SensorStatus::Caution
        } else if self.critical.iter().any(|b| b.contains(value)) {
            SensorStatus::Critical
        } else {
            SensorStatus::Unknown
        }
    }

    /// Non-optimal bands, caution and critical alike.
    pub fn outer_bands(&self) -> impl Iterator<Item = &Band> {
        self.caution.iter().chain(self.critical.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Optimal,
    Caution,
    Critical,
    /// Outside every configured band, or no profile for the key.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub status: SensorStatus,
    pub value: f64,
}

/// Threshold profiles keyed by sensor key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ThresholdTable {
    profiles: BTreeMap<String, ThresholdProfile>,
}

impl ThresholdTable {
    pub fn new(profiles: BTreeMap<String, ThresholdProfile>) -> Self {
        Self { profiles }
    }

    pub fn profile(&self, key: &str) -> Option<&ThresholdProfile> {
        self.profiles.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Tiers are checked optimal, then caution, then critical; the first
    /// match wins. Values matching nothing stay `Unknown`.
    pub fn classify(&self, value: f64, key: &str) -> ClassificationResult {
        let status = self
            .profiles
            .get(key)
            .map(|profile| profile.status_of(value))
            .unwrap_or(SensorStatus::Unknown);

        ClassificationResult { status, value }
    }
}
