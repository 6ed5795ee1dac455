// Time-windowed telemetry retrieval for one device
use crate::application::errors::{AuthError, RequestError, TelemetryError};
use crate::application::session_manager::SessionManager;
use crate::application::telemetry_parser::parse;
use crate::application::telemetry_platform::{TelemetryPlatform, TimeseriesQuery};
use crate::domain::telemetry::{LatestReading, RawTelemetry, TelemetryPoint, TimeWindow};
use std::sync::Arc;

#[derive(Clone)]
pub struct TelemetryFetcher {
    platform: Arc<dyn TelemetryPlatform>,
    sessions: Arc<SessionManager>,
}

impl TelemetryFetcher {
    pub fn new(platform: Arc<dyn TelemetryPlatform>, sessions: Arc<SessionManager>) -> Self {
        Self { platform, sessions }
    }

    /// Make sure a session exists before fanning out over many devices.
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        self.sessions.ensure_session().await.map(|_| ())
    }

    /// One multi-key query over `window`.
    ///
    /// The platform returns at most `limit` points per key. When the window
    /// holds more, the extra points are dropped without any marker in the
    /// response; a key that comes back with exactly `limit` points is logged
    /// as possibly truncated.
    pub async fn fetch(
        &self,
        device_id: &str,
        keys: &[String],
        window: &TimeWindow,
        limit: u32,
    ) -> Result<RawTelemetry, TelemetryError> {
        let query = TimeseriesQuery {
            device_id: device_id.to_string(),
            keys: keys.to_vec(),
            window: Some(window.clone()),
            limit,
        };

        let raw = self
            .query(&query)
            .await
            .map_err(|err| TelemetryError::from_request(device_id, err))?;

        for (key, samples) in &raw {
            if samples.len() >= limit as usize {
                tracing::warn!(
                    "Series {} of device {} hit the limit of {} points; older points may be missing",
                    key,
                    device_id,
                    limit
                );
            }
        }
        tracing::debug!("Fetched {} keys for device {}", raw.len(), device_id);

        Ok(raw)
    }

    /// [`fetch`](Self::fetch) followed by parsing.
    pub async fn fetch_points(
        &self,
        device_id: &str,
        keys: &[String],
        window: &TimeWindow,
        limit: u32,
    ) -> Result<Vec<TelemetryPoint>, TelemetryError> {
        let raw = self.fetch(device_id, keys, window, limit).await?;
        parse(device_id, &raw).map_err(|source| TelemetryError::Malformed {
            device_id: device_id.to_string(),
            source,
        })
    }

    /// Most recent point of `key`, regardless of age.
    ///
    /// Auth failures are returned as errors. Any other failure, including a
    /// malformed answer, is reported as `TransientError`.
    pub async fn fetch_latest(
        &self,
        device_id: &str,
        key: &str,
    ) -> Result<LatestReading, AuthError> {
        let query = TimeseriesQuery {
            device_id: device_id.to_string(),
            keys: vec![key.to_string()],
            window: None,
            limit: 1,
        };

        let raw = match self.query(&query).await {
            Ok(raw) => raw,
            Err(RequestError::Auth(err)) => return Err(err),
            Err(RequestError::Platform(err)) => {
                tracing::warn!("Latest {} for device {} unavailable: {}", key, device_id, err);
                return Ok(LatestReading::TransientError {
                    reason: err.to_string(),
                });
            }
        };

        let points = match parse(device_id, &raw) {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!("Latest {} for device {} malformed: {}", key, device_id, err);
                return Ok(LatestReading::TransientError {
                    reason: err.to_string(),
                });
            }
        };

        Ok(points
            .into_iter()
            .filter(|p| p.key == key)
            .max_by_key(|p| p.timestamp)
            .map(|point| LatestReading::Found { point })
            .unwrap_or(LatestReading::NotFound))
    }

    async fn query(&self, query: &TimeseriesQuery) -> Result<RawTelemetry, RequestError> {
        let platform = &self.platform;
        self.sessions
            .authorized(|session| async move {
                platform.timeseries(&session.access_token, query).await
            })
            .await
    }
}
