// ThingsBoard REST client
use crate::application::errors::PlatformError;
use crate::application::telemetry_platform::{TelemetryPlatform, TimeseriesQuery};
use crate::domain::device::{Device, DevicePage};
use crate::domain::session::{Credentials, Session, TokenPair};
use crate::domain::telemetry::RawTelemetry;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const AUTH_HEADER: &str = "X-Authorization";

#[derive(Debug, Clone)]
pub struct ThingsBoardClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceInfoPage {
    #[serde(default)]
    data: Vec<DeviceInfo>,
    #[serde(default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct DeviceInfo {
    id: EntityId,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntityId {
    id: String,
}

impl ThingsBoardClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PlatformError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                return Err(PlatformError::Unauthorized(body));
            }
            return Err(PlatformError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TelemetryPlatform for ThingsBoardClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, PlatformError> {
        tracing::debug!("Logging in to {} as {}", self.base_url, credentials.username);
        let request = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            });

        let tokens: TokenResponse = self.execute(request).await?;
        Ok(TokenPair {
            access_token: tokens.token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn refresh(&self, session: &Session) -> Result<TokenPair, PlatformError> {
        let request = self
            .http
            .post(self.url("/api/auth/token"))
            .header(AUTH_HEADER, Self::bearer(&session.access_token))
            .json(&RefreshRequest {
                refresh_token: &session.refresh_token,
            });

        let tokens: TokenResponse = self.execute(request).await?;
        Ok(TokenPair {
            access_token: tokens.token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn device_page(
        &self,
        token: &str,
        page_size: u32,
        page: u32,
    ) -> Result<DevicePage, PlatformError> {
        let request = self
            .http
            .get(self.url("/api/tenant/deviceInfos"))
            .header(AUTH_HEADER, Self::bearer(token))
            .query(&[("pageSize", page_size), ("page", page)]);

        let body: DeviceInfoPage = self.execute(request).await?;
        Ok(DevicePage {
            devices: body
                .data
                .into_iter()
                .map(|info| Device::new(info.id.id, info.name.unwrap_or_default()))
                .collect(),
            has_next: body.has_next,
        })
    }

    async fn timeseries(
        &self,
        token: &str,
        query: &TimeseriesQuery,
    ) -> Result<RawTelemetry, PlatformError> {
        let path = format!(
            "/api/plugins/telemetry/DEVICE/{}/values/timeseries",
            urlencoding::encode(&query.device_id)
        );

        let mut params = vec![
            ("keys", query.keys.join(",")),
            ("limit", query.limit.to_string()),
        ];
        if let Some(window) = &query.window {
            params.push(("startTs", window.start_ms().to_string()));
            params.push(("endTs", window.end_ms().to_string()));
        }

        tracing::debug!("Querying {} for device {}", params[0].1, query.device_id);
        let request = self
            .http
            .get(self.url(&path))
            .header(AUTH_HEADER, Self::bearer(token))
            .query(&params);

        self.execute(request).await
    }
}
