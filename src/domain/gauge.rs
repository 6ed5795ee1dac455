// 0-1 sensor gauge with a traffic-light signal
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Green,
    Amber,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gauge {
    pub level: f64,
    pub signal: Signal,
}

impl Gauge {
    /// Values above 1 are read as percentages. The level is clamped to [0, 1].
    pub fn from_reading(value: f64) -> Self {
        let level = if value > 1.0 { value / 100.0 } else { value };
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };

        let signal = if level <= 0.33 {
            Signal::Green
        } else if level <= 0.66 {
            Signal::Amber
        } else {
            Signal::Red
        };

        Self { level, signal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_readings() {
        assert_eq!(Gauge::from_reading(0.2).signal, Signal::Green);
        assert_eq!(Gauge::from_reading(0.33).signal, Signal::Green);
        assert_eq!(Gauge::from_reading(0.5).signal, Signal::Amber);
        assert_eq!(Gauge::from_reading(0.9).signal, Signal::Red);
    }

    #[test]
    fn test_percentage_readings() {
        let gauge = Gauge::from_reading(45.0);
        assert!((gauge.level - 0.45).abs() < 1e-12);
        assert_eq!(gauge.signal, Signal::Amber);

        assert_eq!(Gauge::from_reading(1500.0).level, 1.0);
    }

    #[test]
    fn test_negative_readings_clamp_to_zero() {
        let gauge = Gauge::from_reading(-4.0);
        assert_eq!(gauge.level, 0.0);
        assert_eq!(gauge.signal, Signal::Green);
    }
}
