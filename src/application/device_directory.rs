// Paginated device discovery
use crate::application::cache::CacheLayer;
use crate::application::errors::{AuthError, RequestError};
use crate::application::session_manager::SessionManager;
use crate::application::telemetry_platform::TelemetryPlatform;
use crate::domain::device::{DeviceListing, DevicePage};
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY: &str = "devices";

#[derive(Clone)]
pub struct DeviceDirectory {
    platform: Arc<dyn TelemetryPlatform>,
    sessions: Arc<SessionManager>,
    cache: Arc<CacheLayer>,
    page_size: u32,
    ttl: Duration,
}

impl DeviceDirectory {
    pub fn new(
        platform: Arc<dyn TelemetryPlatform>,
        sessions: Arc<SessionManager>,
        cache: Arc<CacheLayer>,
        page_size: u32,
        ttl: Duration,
    ) -> Self {
        Self {
            platform,
            sessions,
            cache,
            page_size: page_size.max(1),
            ttl,
        }
    }

    /// All tenant devices, cached for the directory TTL.
    ///
    /// A failing page ends pagination: the devices gathered so far are
    /// returned with `truncated` set, and such a listing is not cached.
    pub async fn list_devices(&self) -> Result<DeviceListing, AuthError> {
        self.cache
            .get_or_compute_if(
                CACHE_KEY,
                self.ttl,
                || self.walk_pages(),
                |listing: &DeviceListing| !listing.truncated,
            )
            .await
    }

    async fn walk_pages(&self) -> Result<DeviceListing, AuthError> {
        let mut listing = DeviceListing::default();
        let mut page = 0;

        tracing::info!("Listing tenant devices");
        loop {
            match self.fetch_page(page).await {
                Ok(fetched) => {
                    tracing::debug!("Page {}: {} devices", page, fetched.devices.len());
                    // An empty page claiming more pages would never end
                    let exhausted = fetched.devices.is_empty();
                    listing.devices.extend(fetched.devices);
                    if !fetched.has_next {
                        break;
                    }
                    if exhausted {
                        tracing::warn!("Page {} was empty but reported more pages; stopping", page);
                        break;
                    }
                    page += 1;
                }
                Err(RequestError::Auth(err)) => return Err(err),
                Err(RequestError::Platform(err)) => {
                    tracing::warn!(
                        "Device page {} failed, returning {} devices gathered so far: {}",
                        page,
                        listing.devices.len(),
                        err
                    );
                    listing.truncated = true;
                    break;
                }
            }
        }

        tracing::info!(
            "Listed {} devices{}",
            listing.devices.len(),
            if listing.truncated { " (truncated)" } else { "" }
        );
        Ok(listing)
    }

    async fn fetch_page(&self, page: u32) -> Result<DevicePage, RequestError> {
        let platform = &self.platform;
        let page_size = self.page_size;
        self.sessions
            .authorized(|session| async move {
                platform
                    .device_page(&session.access_token, page_size, page)
                    .await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::PlatformError;
    use crate::application::testing::{FakePlatform, credentials, page};
    use std::sync::atomic::Ordering;

    fn directory(platform: &Arc<FakePlatform>) -> DeviceDirectory {
        let sessions = Arc::new(SessionManager::new(platform.clone(), credentials()));
        DeviceDirectory::new(
            platform.clone(),
            sessions,
            Arc::new(CacheLayer::new()),
            2,
            Duration::from_secs(3600),
        )
    }

    fn ids(listing: &DeviceListing) -> Vec<&str> {
        listing.devices.iter().map(|d| d.id.as_str()).collect()
    }

    fn server_error() -> PlatformError {
        PlatformError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_concatenates_pages_in_order() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_page(page(&["a", "b"], true))
                .with_page(page(&["c", "d"], true))
                .with_page(page(&["e"], false)),
        );

        let listing = directory(&platform).list_devices().await.unwrap();
        assert_eq!(ids(&listing), vec!["a", "b", "c", "d", "e"]);
        assert!(!listing.truncated);
        assert_eq!(platform.page_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failing_page_truncates() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_page(page(&["a", "b"], true))
                .with_page(page(&["c", "d"], true))
                .with_page(Err(server_error()))
                .with_page(page(&["g"], false)),
        );

        let listing = directory(&platform).list_devices().await.unwrap();
        assert_eq!(ids(&listing), vec!["a", "b", "c", "d"]);
        assert!(listing.truncated);
        assert_eq!(platform.page_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_empty_and_truncated() {
        let platform = Arc::new(FakePlatform::new().with_page(Err(server_error())));

        let listing = directory(&platform).list_devices().await.unwrap();
        assert!(listing.devices.is_empty());
        assert!(listing.truncated);
    }

    #[tokio::test]
    async fn test_complete_listing_is_cached() {
        let platform = Arc::new(FakePlatform::new().with_page(page(&["a"], false)));
        let directory = directory(&platform);

        directory.list_devices().await.unwrap();
        directory.list_devices().await.unwrap();
        assert_eq!(platform.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_truncated_listing_is_not_cached() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_page(page(&["a"], true))
                .with_page(Err(server_error())),
        );
        let directory = directory(&platform);

        directory.list_devices().await.unwrap();
        directory.list_devices().await.unwrap();
        assert_eq!(platform.page_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_page_ends_pagination() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_page(page(&["a"], true))
                .with_page(page(&[], true))
                .with_page(page(&["c"], false)),
        );

        let listing = directory(&platform).list_devices().await.unwrap();
        assert_eq!(ids(&listing), vec!["a"]);
        assert!(!listing.truncated);
    }

    #[tokio::test]
    async fn test_login_failure_is_fatal() {
        let platform = Arc::new(
            FakePlatform::new()
                .failing_login(PlatformError::Unauthorized("bad password".to_string()))
                .with_page(page(&["a"], false)),
        );

        let result = directory(&platform).list_devices().await;
        assert_eq!(result.unwrap_err().status, Some(401));
        assert_eq!(platform.page_calls.load(Ordering::SeqCst), 0);
    }
}
