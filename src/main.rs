// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::aggregator::MultiDeviceAggregator;
use crate::application::agronomy_service::{AgronomyService, QueryDefaults};
use crate::application::cache::CacheLayer;
use crate::application::device_directory::DeviceDirectory;
use crate::application::session_manager::SessionManager;
use crate::application::telemetry_fetcher::TelemetryFetcher;
use crate::domain::session::Credentials;
use crate::infrastructure::config::{load_app_config, load_threshold_config};
use crate::infrastructure::thingsboard_client::ThingsBoardClient;
use crate::presentation::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let app_config = load_app_config()?;
    let threshold_config = load_threshold_config()?;
    tracing::debug!("Loaded configuration: {:?}", app_config);

    // Create platform client (infrastructure layer)
    let tb = &app_config.thingsboard;
    let platform = Arc::new(
        ThingsBoardClient::new(&tb.base_url, tb.request_timeout())
            .context("Failed to build ThingsBoard client")?,
    );
    let credentials = Credentials::new(tb.username.clone(), tb.password.clone());

    // Create services (application layer)
    let telemetry = &app_config.telemetry;
    let sessions = Arc::new(SessionManager::new(platform.clone(), credentials));
    let cache = Arc::new(CacheLayer::new());
    let directory = DeviceDirectory::new(
        platform.clone(),
        sessions.clone(),
        cache.clone(),
        telemetry.page_size,
        app_config.cache.device_ttl(),
    );
    let fetcher = TelemetryFetcher::new(platform, sessions);
    let aggregator = MultiDeviceAggregator::new(
        fetcher,
        cache,
        app_config.cache.telemetry_ttl(),
        telemetry.max_concurrency,
    );
    let agronomy_service = AgronomyService::new(
        directory,
        aggregator,
        Arc::new(threshold_config.thresholds),
        Arc::new(threshold_config.risk),
        QueryDefaults {
            keys: telemetry.keys.clone(),
            limit: telemetry.limit,
            days_back: telemetry.days_back,
            battery_key: telemetry.battery_key.clone(),
        },
    );

    // Create application state
    let state = Arc::new(AppState { agronomy_service });

    // Build router (presentation layer)
    let router = presentation::router(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address {:?}", app_config.server.bind))?;
    tracing::info!("Starting soil-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
