use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::StoreError;
use crate::schedule::Schedule;
use crate::server::types::ApiErrorType;
use crate::server::AppState;
use crate::store::{new_schedule_id, SavedSchedule};
use crate::types::Section;

fn default_name() -> String {
    "My Schedule".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SaveScheduleRequest {
    /// Saving with an existing id overwrites that schedule
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

fn store_error_to_response(message: &str, error: StoreError) -> Response {
    ApiErrorType::from((
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
        Some(error.to_string()),
    ))
    .into_response()
}

/// GET /api/user/:user_id/schedule
/// Returns the sections of the most recently saved schedule, or `[]`
pub async fn get_schedule(
    Path(user_id): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /api/user/{}/schedule", user_id);

    match s.store.load_sections(&user_id).await {
        Ok(sections) => (StatusCode::OK, Json(sections)).into_response(),
        Err(e) => store_error_to_response("Failed to load schedule", e),
    }
}

/// GET /api/user/:user_id/schedules
pub async fn get_schedules(
    Path(user_id): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /api/user/{}/schedules", user_id);

    match s.store.list(&user_id).await {
        Ok(saved) => (StatusCode::OK, Json(saved)).into_response(),
        Err(e) => store_error_to_response("Failed to list schedules", e),
    }
}

/// POST /api/user/:user_id/schedule
pub async fn post_schedule(
    Path(user_id): Path<String>,
    State(s): State<Arc<AppState>>,
    Json(body): Json<SaveScheduleRequest>,
) -> Response {
    info!("POST /api/user/{}/schedule", user_id);

    let id = body
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_schedule_id);
    let saved = SavedSchedule {
        id: id.clone(),
        user_id,
        name: body.name,
        // Repeated section ids collapse to one
        sections: Schedule::from_sections(body.sections).into_sections(),
        saved_at: Utc::now(),
    };

    match s.store.save(saved).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "saved", "id": id }))).into_response(),
        Err(e) => store_error_to_response("Failed to save schedule", e),
    }
}
