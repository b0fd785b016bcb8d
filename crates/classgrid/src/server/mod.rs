use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;

use crate::catalog::CatalogClient;
use crate::config::GridConfig;
use crate::server::endpoints::{catalog, grid, schedule, status};
use crate::store::ScheduleStore;

mod endpoints;
mod types;

pub use types::ApiErrorType;

/// Shared state handed to every handler.
pub struct AppState {
    pub catalog: Arc<dyn CatalogClient>,
    pub store: Arc<dyn ScheduleStore>,
    /// Window used by `/api/grid` when the request does not set one
    pub grid: GridConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        store: Arc<dyn ScheduleStore>,
        grid: GridConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            grid,
            started_at: Instant::now(),
        }
    }
}

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/search", get(catalog::get_search))
        .route("/sections", get(catalog::get_sections))
        .route(
            "/user/:user_id/schedule",
            get(schedule::get_schedule).post(schedule::post_schedule),
        )
        .route("/user/:user_id/schedules", get(schedule::get_schedules))
        .route("/grid", post(grid::post_grid))
        .route("/generate", post(grid::post_generate));

    Router::new()
        .route("/health", get(status::get_health))
        .nest("/api", api_router)
        .with_state(app_state)
}
