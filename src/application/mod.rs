// Application layer - Use cases and orchestration over the platform
pub mod aggregator;
pub mod agronomy_service;
pub mod cache;
pub mod device_directory;
pub mod errors;
pub mod session_manager;
pub mod telemetry_fetcher;
pub mod telemetry_parser;
pub mod telemetry_platform;

#[cfg(test)]
pub mod testing;
