// Application state for HTTP handlers
use crate::application::agronomy_service::AgronomyService;

#[derive(Clone)]
pub struct AppState {
    pub agronomy_service: AgronomyService,
}
