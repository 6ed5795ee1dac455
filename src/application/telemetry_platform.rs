// Platform trait for remote telemetry access
use crate::application::errors::PlatformError;
use crate::domain::device::DevicePage;
use crate::domain::session::{Credentials, Session, TokenPair};
use crate::domain::telemetry::{RawTelemetry, TimeWindow};
use async_trait::async_trait;

/// A time-series query for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesQuery {
    pub device_id: String,
    pub keys: Vec<String>,
    /// `None` asks for the most recent points regardless of age.
    pub window: Option<TimeWindow>,
    pub limit: u32,
}

#[async_trait]
pub trait TelemetryPlatform: Send + Sync {
    /// Exchange tenant credentials for a token pair
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, PlatformError>;

    /// Exchange the session's refresh token for a new token pair
    async fn refresh(&self, session: &Session) -> Result<TokenPair, PlatformError>;

    /// Fetch one page of the tenant's devices
    async fn device_page(
        &self,
        token: &str,
        page_size: u32,
        page: u32,
    ) -> Result<DevicePage, PlatformError>;

    /// Fetch raw per-key time series for one device
    async fn timeseries(
        &self,
        token: &str,
        query: &TimeseriesQuery,
    ) -> Result<RawTelemetry, PlatformError>;
}
