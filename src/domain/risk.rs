// Nutrient-lockout risk index
use super::classification::{ThresholdProfile, ThresholdTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskPolicyError {
    #[error("weight for {name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("at least one risk weight must be positive")]
    AllWeightsZero,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskInputError {
    #[error("no reading available for sensor key {0}")]
    MissingReading(String),
    #[error("no threshold profile configured for sensor key {0}")]
    MissingProfile(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskWeights {
    pub humidity: f64,
    pub temperature: f64,
    pub conductivity: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            humidity: 0.40,
            temperature: 0.25,
            conductivity: 0.35,
        }
    }
}

/// Which sensor keys feed each risk component, and how the components are
/// weighted into the 0-10 score.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskPolicy {
    #[serde(default = "default_humidity_key")]
    pub humidity_key: String,
    #[serde(default = "default_temperature_key")]
    pub temperature_key: String,
    #[serde(default = "default_conductivity_key")]
    pub conductivity_key: String,
    #[serde(default)]
    pub weights: RiskWeights,
}

fn default_humidity_key() -> String {
    "humidity".to_string()
}

fn default_temperature_key() -> String {
    "temperature".to_string()
}

fn default_conductivity_key() -> String {
    "soil_conductivity".to_string()
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            humidity_key: default_humidity_key(),
            temperature_key: default_temperature_key(),
            conductivity_key: default_conductivity_key(),
            weights: RiskWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskComponents {
    pub humidity_risk: f64,
    pub temperature_risk: f64,
    pub conductivity_risk: f64,
    pub score: f64,
}

impl RiskPolicy {
    pub fn validate(&self) -> Result<(), RiskPolicyError> {
        let weights = [
            ("humidity", self.weights.humidity),
            ("temperature", self.weights.temperature),
            ("conductivity", self.weights.conductivity),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(RiskPolicyError::InvalidWeight { name, value });
            }
        }
        if weights.iter().all(|(_, w)| *w == 0.0) {
            return Err(RiskPolicyError::AllWeightsZero);
        }
        Ok(())
    }

    pub fn sensor_keys(&self) -> [&str; 3] {
        [
            self.humidity_key.as_str(),
            self.temperature_key.as_str(),
            self.conductivity_key.as_str(),
        ]
    }

    /// Weighted mean of the three components scaled to 0-10.
    ///
    /// Components are clamped into [0, 1] first and NaN counts as full risk,
    /// so the score is bounded and never decreases when one input grows.
    pub fn score(
        &self,
        humidity_risk: f64,
        temperature_risk: f64,
        conductivity_risk: f64,
    ) -> RiskComponents {
        let humidity_risk = unit(humidity_risk);
        let temperature_risk = unit(temperature_risk);
        let conductivity_risk = unit(conductivity_risk);

        let w = &self.weights;
        let total = w.humidity + w.temperature + w.conductivity;
        let weighted = w.humidity * humidity_risk
            + w.temperature * temperature_risk
            + w.conductivity * conductivity_risk;
        let score = if total > 0.0 {
            (10.0 * weighted / total).clamp(0.0, 10.0)
        } else {
            0.0
        };

        RiskComponents {
            humidity_risk,
            temperature_risk,
            conductivity_risk,
            score,
        }
    }

    /// Scores averaged sensor values against the threshold table.
    pub fn assess(
        &self,
        thresholds: &ThresholdTable,
        averages: &BTreeMap<String, f64>,
    ) -> Result<RiskComponents, RiskInputError> {
        let component = |key: &str| -> Result<f64, RiskInputError> {
            let value = averages
                .get(key)
                .ok_or_else(|| RiskInputError::MissingReading(key.to_string()))?;
            let profile = thresholds
                .profile(key)
                .ok_or_else(|| RiskInputError::MissingProfile(key.to_string()))?;
            Ok(deviation_risk(profile, *value))
        };

        Ok(self.score(
            component(&self.humidity_key)?,
            component(&self.temperature_key)?,
            component(&self.conductivity_key)?,
        ))
    }
}

fn unit(risk: f64) -> f64 {
    if risk.is_nan() { 1.0 } else { risk.clamp(0.0, 1.0) }
}

/// Normalized distance of `value` outside the optimal band.
///
/// 0 inside the band. Outside, the distance to the nearest optimal edge is
/// divided by the distance from that edge to the outermost caution/critical
/// bound on the same side, saturating at 1. Without bands on that side the
/// optimal width is used as the span.
pub fn deviation_risk(profile: &ThresholdProfile, value: f64) -> f64 {
    let optimal = profile.optimal;
    if value.is_nan() {
        return 1.0;
    }
    if optimal.contains(value) {
        return 0.0;
    }

    let width = optimal.hi() - optimal.lo();
    if value < optimal.lo() {
        let outer = profile
            .outer_bands()
            .map(|b| b.lo())
            .filter(|lo| *lo < optimal.lo())
            .fold(optimal.lo(), f64::min);
        let span = if outer < optimal.lo() { optimal.lo() - outer } else { width };
        saturating_ratio(optimal.lo() - value, span)
    } else {
        let outer = profile
            .outer_bands()
            .map(|b| b.hi())
            .filter(|hi| *hi > optimal.hi())
            .fold(optimal.hi(), f64::max);
        let span = if outer > optimal.hi() { outer - optimal.hi() } else { width };
        saturating_ratio(value - optimal.hi(), span)
    }
}

fn saturating_ratio(distance: f64, span: f64) -> f64 {
    if span <= 0.0 { 1.0 } else { (distance / span).min(1.0) }
}
