// Raw telemetry payload -> normalized points
use crate::application::errors::MalformedPayloadError;
use crate::domain::telemetry::{RawSample, RawTelemetry, TelemetryPoint};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Flatten per-key arrays into one series sorted by timestamp.
///
/// `ts` must be integer epoch milliseconds and `value` a finite number; both
/// may arrive as JSON numbers or numeric strings. Within a key, a repeated
/// timestamp keeps its first occurrence.
pub fn parse(
    device_id: &str,
    raw: &RawTelemetry,
) -> Result<Vec<TelemetryPoint>, MalformedPayloadError> {
    let mut points = Vec::new();

    for (key, samples) in raw {
        let mut series = Vec::with_capacity(samples.len());
        for (index, sample) in samples.iter().enumerate() {
            let timestamp = parse_timestamp(key, index, sample.ts.as_ref())?;
            let value = parse_value(key, index, sample.value.as_ref())?;
            series.push(TelemetryPoint::new(
                device_id.to_string(),
                key.clone(),
                timestamp,
                value,
            ));
        }
        series.sort_by_key(|p| p.timestamp);
        series.dedup_by_key(|p| p.timestamp);
        points.extend(series);
    }

    // Stable: equal timestamps keep key order
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

/// Rebuild the wire shape from points.
pub fn to_raw(points: &[TelemetryPoint]) -> RawTelemetry {
    let mut raw = RawTelemetry::new();
    for point in points {
        raw.entry(point.key.clone()).or_default().push(RawSample {
            ts: Some(Value::from(point.timestamp_ms())),
            value: Some(Value::from(point.value)),
        });
    }
    raw
}

fn parse_timestamp(
    key: &str,
    index: usize,
    ts: Option<&Value>,
) -> Result<DateTime<Utc>, MalformedPayloadError> {
    let non_numeric = |raw: &Value| MalformedPayloadError::NonNumeric {
        key: key.to_string(),
        index,
        field: "ts",
        raw: raw.to_string(),
    };

    let ms = match ts {
        None | Some(Value::Null) => {
            return Err(MalformedPayloadError::MissingField {
                key: key.to_string(),
                index,
                field: "ts",
            });
        }
        Some(raw @ Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_ms))
            .ok_or_else(|| non_numeric(raw))?,
        Some(raw @ Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_ms))
                .ok_or_else(|| non_numeric(raw))?
        }
        Some(other) => return Err(non_numeric(other)),
    };

    DateTime::from_timestamp_millis(ms).ok_or_else(|| MalformedPayloadError::TimestampOutOfRange {
        key: key.to_string(),
        index,
        ts: ms,
    })
}

fn integral_ms(ms: f64) -> Option<i64> {
    if ms.is_finite() && ms.fract() == 0.0 && ms.abs() < i64::MAX as f64 {
        Some(ms as i64)
    } else {
        None
    }
}

fn parse_value(
    key: &str,
    index: usize,
    value: Option<&Value>,
) -> Result<f64, MalformedPayloadError> {
    let parsed = match value {
        None | Some(Value::Null) => {
            return Err(MalformedPayloadError::MissingField {
                key: key.to_string(),
                index,
                field: "value",
            });
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(MalformedPayloadError::NonNumeric {
            key: key.to_string(),
            index,
            field: "value",
            raw: value.map(Value::to_string).unwrap_or_default(),
        }),
    }
}
