// Multi-device fan-out with per-device failure tolerance
use crate::application::cache::CacheLayer;
use crate::application::errors::TelemetryError;
use crate::application::telemetry_fetcher::TelemetryFetcher;
use crate::domain::telemetry::{LatestReading, TelemetryPoint, TimeWindow};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// A device left out of an aggregate, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceFailure {
    pub device_id: String,
    pub reason: String,
}

/// Points from every device that answered, plus the devices that did not.
/// Point order across devices is unspecified; each device's own series is
/// sorted by timestamp.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregation {
    pub points: Vec<TelemetryPoint>,
    pub failures: Vec<DeviceFailure>,
}

#[derive(Clone)]
pub struct MultiDeviceAggregator {
    fetcher: TelemetryFetcher,
    cache: Arc<CacheLayer>,
    ttl: Duration,
    max_concurrency: usize,
}

impl MultiDeviceAggregator {
    pub fn new(
        fetcher: TelemetryFetcher,
        cache: Arc<CacheLayer>,
        ttl: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            cache,
            ttl,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Fetch and parse telemetry for every device. Never fails as a whole:
    /// devices whose fetch, auth or parse fails are logged, skipped and
    /// listed in `failures`.
    pub async fn aggregate(
        &self,
        device_ids: &[String],
        window: &TimeWindow,
        keys: &[String],
        limit: u32,
    ) -> Aggregation {
        // One login attempt for the whole fan-out; cached devices still answer
        let auth = self.fetcher.authenticate().await.err();
        let auth = auth.as_ref();

        let results: Vec<_> = stream::iter(device_ids.iter().cloned())
            .map(|device_id| async move {
                let cache_key = format!(
                    "telemetry:{}:{}:{}:{}",
                    device_id,
                    keys.join(","),
                    window.cache_tag(),
                    limit
                );
                let result = self
                    .cache
                    .get_or_compute(&cache_key, self.ttl, || async {
                        if let Some(err) = auth {
                            return Err(TelemetryError::Auth {
                                device_id: device_id.clone(),
                                source: err.clone(),
                            });
                        }
                        self.fetcher
                            .fetch_points(&device_id, keys, window, limit)
                            .await
                    })
                    .await;
                (device_id, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut aggregation = Aggregation::default();
        for (device_id, result) in results {
            match result {
                Ok(points) => aggregation.points.extend(points),
                Err(err) => {
                    tracing::warn!("Skipping device {}: {}", device_id, err);
                    aggregation.failures.push(DeviceFailure {
                        device_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Aggregated {} points from {} of {} devices",
            aggregation.points.len(),
            device_ids.len() - aggregation.failures.len(),
            device_ids.len()
        );
        aggregation
    }

    /// Latest value of `key` for every device. Definite answers are cached;
    /// transient failures are not.
    pub async fn latest_readings(
        &self,
        device_ids: &[String],
        key: &str,
    ) -> Vec<(String, LatestReading)> {
        let auth = self.fetcher.authenticate().await.err();
        let auth = auth.as_ref();

        stream::iter(device_ids.iter().cloned())
            .map(|device_id| async move {
                let cache_key = format!("latest:{}:{}", device_id, key);
                let reading = self
                    .cache
                    .get_or_compute_if(
                        &cache_key,
                        self.ttl,
                        || async {
                            match auth {
                                Some(err) => Err(err.clone()),
                                None => self.fetcher.fetch_latest(&device_id, key).await,
                            }
                        },
                        |reading: &LatestReading| !reading.is_transient(),
                    )
                    .await
                    .unwrap_or_else(|err| {
                        tracing::warn!("Latest {} for device {} failed: {}", key, device_id, err);
                        LatestReading::TransientError {
                            reason: err.to_string(),
                        }
                    });
                (device_id, reading)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }
}
