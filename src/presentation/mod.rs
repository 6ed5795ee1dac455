// Presentation layer - HTTP routes and handlers
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    battery_overview, daily_profile, device_status, device_telemetry, fleet_risk, health_check,
    list_devices,
};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/devices", get(list_devices))
        .route("/devices/:id/telemetry", get(device_telemetry))
        .route("/devices/:id/status", get(device_status))
        .route("/devices/:id/profile/:key", get(daily_profile))
        .route("/batteries", get(battery_overview))
        .route("/risk", get(fleet_risk))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
