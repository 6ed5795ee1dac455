// HTTP request handlers
use crate::application::errors::AuthError;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub days: Option<u32>,
}

/// Upstream login failures surface as a bad gateway.
pub struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Platform authentication failed: {}", self.0);
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "upstream_status": self.0.status,
        });

        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_devices(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let listing = state.agronomy_service.list_devices().await?;
    Ok(Json(listing).into_response())
}

pub async fn device_telemetry(
    Path(id): Path<String>,
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.agronomy_service.device_telemetry(&id, query.days).await)
}

pub async fn device_status(
    Path(id): Path<String>,
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.agronomy_service.device_status(&id, query.days).await)
}

pub async fn daily_profile(
    Path((id, key)): Path<(String, String)>,
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(
        state
            .agronomy_service
            .daily_profile(&id, &key, query.days)
            .await,
    )
}

pub async fn battery_overview(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let overview = state.agronomy_service.battery_overview().await?;
    Ok(Json(overview).into_response())
}

pub async fn fleet_risk(
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let risk = state.agronomy_service.fleet_risk(query.days).await?;
    Ok(Json(risk).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::PlatformError;
    use crate::application::testing::{FakePlatform, agronomy_service, page, raw, sample};
    use crate::presentation::router;
    use axum::{Router, body::Body, http::Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(platform: FakePlatform) -> Router {
        let platform = Arc::new(platform);
        router(Arc::new(AppState {
            agronomy_service: agronomy_service(&platform),
        }))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn reporting_platform() -> FakePlatform {
        FakePlatform::new()
            .with_page(page(&["d1", "d2"], false))
            .with_telemetry(
                "d1",
                Ok(raw(&[
                    ("humidity", vec![sample(1_000, "30")]),
                    ("temperature", vec![sample(1_000, "21")]),
                    ("soil_conductivity", vec![sample(1_000, "700")]),
                ])),
            )
            .with_telemetry("d2", Err(PlatformError::Transport("timeout".to_string())))
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app(FakePlatform::new())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_devices() {
        let (status, body) = get(app(reporting_platform()), "/devices").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["devices"][0]["id"], "d1");
        assert_eq!(body["devices"][1]["name"], "Sonda d2");
        assert_eq!(body["truncated"], false);
    }

    #[tokio::test]
    async fn test_login_failure_is_bad_gateway() {
        let platform =
            FakePlatform::new().failing_login(PlatformError::Unauthorized("locked".to_string()));
        let (status, body) = get(app(platform), "/devices").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["upstream_status"], 401);
        assert!(body["error"].as_str().unwrap().contains("authentication failed"));
    }

    #[tokio::test]
    async fn test_device_status() {
        let (status, body) = get(app(reporting_platform()), "/devices/d1/status?days=7").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["device_id"], "d1");
        assert_eq!(body["readings"].as_array().unwrap().len(), 3);
        assert_eq!(body["readings"][0]["key"], "humidity");
        assert_eq!(body["readings"][0]["status"], "optimal");
    }

    #[tokio::test]
    async fn test_device_telemetry_lists_failure() {
        let (status, body) = get(app(reporting_platform()), "/devices/d2/telemetry").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["points"].as_array().unwrap().is_empty());
        assert_eq!(body["failures"][0]["device_id"], "d2");
    }

    #[tokio::test]
    async fn test_fleet_risk() {
        let (status, body) = get(app(reporting_platform()), "/risk?days=30").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reporting_devices"], 1);
        assert_eq!(body["risk"]["score"], 0.0);
        assert_eq!(body["failures"][0]["device_id"], "d2");
    }

    #[tokio::test]
    async fn test_daily_profile_route() {
        let (status, body) = get(app(reporting_platform()), "/devices/d1/profile/humidity").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], "humidity");
        assert_eq!(body["periods"][0]["period"], "night");
    }

    #[tokio::test]
    async fn test_huge_lookback_is_served() {
        for uri in [
            "/risk?days=100000000",
            "/devices/d1/telemetry?days=4294967295",
            "/devices/d1/status?days=100000000",
            "/devices/d1/profile/humidity?days=100000000",
        ] {
            let (status, _) = get(app(reporting_platform()), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_invalid_days_is_rejected() {
        let (status, _) = get(app(reporting_platform()), "/risk?days=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
