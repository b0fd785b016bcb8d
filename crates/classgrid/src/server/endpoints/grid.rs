use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Weekday;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GridConfig;
use crate::error::GenerateError;
use crate::generate::{generate_schedules, DEFAULT_RESULT_LIMIT};
use crate::grid::layout;
use crate::schedule::Schedule;
use crate::server::types::ApiErrorType;
use crate::server::AppState;
use crate::time;
use crate::types::Section;

#[derive(Debug, Deserialize)]
pub struct GridRequest {
    #[serde(default)]
    pub sections: Vec<Section>,
    pub days: Option<Vec<Weekday>>,
    /// Clock text such as "8:00 AM" or "08:00"
    pub start: Option<String>,
    pub end: Option<String>,
    pub slot_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub course_ids: Vec<String>,
    pub limit: Option<usize>,
}

fn bad_request(message: &str, details: Option<String>) -> Response {
    ApiErrorType::from((StatusCode::BAD_REQUEST, message, details)).into_response()
}

fn parse_bound(text: Option<&str>, fallback: i32) -> Result<i32, String> {
    match text {
        Some(text) => time::parse_clock(text).ok_or_else(|| format!("Unrecognized time {:?}", text)),
        None => Ok(fallback),
    }
}

/// Applies the request's window overrides on top of the configured grid.
fn request_window(defaults: &GridConfig, req: &GridRequest) -> Result<GridConfig, String> {
    let window = GridConfig {
        days: req.days.clone().unwrap_or_else(|| defaults.days.clone()),
        start_minute: parse_bound(req.start.as_deref(), defaults.start_minute)?,
        end_minute: parse_bound(req.end.as_deref(), defaults.end_minute)?,
        slot_minutes: req.slot_minutes.unwrap_or(defaults.slot_minutes),
    };
    window.validate().map_err(|e| e.to_string())?;
    Ok(window)
}

/// POST /api/grid
/// Lays out the given sections and lists conflicts alongside the grid
pub async fn post_grid(State(s): State<Arc<AppState>>, Json(req): Json<GridRequest>) -> Response {
    info!("POST /api/grid ({} sections)", req.sections.len());

    let window = match request_window(&s.grid, &req) {
        Ok(window) => window,
        Err(details) => return bad_request("Invalid grid window", Some(details)),
    };

    let schedule = Schedule::from_sections(req.sections);
    let grid = layout(&schedule, &window.days, &window.slots());
    let conflicts = schedule.conflicts();

    (
        StatusCode::OK,
        Json(json!({
            "grid": grid,
            "conflicts": conflicts,
        })),
    )
        .into_response()
}

/// POST /api/generate
/// Input is course ids, not CRNs: every section of each course is considered
pub async fn post_generate(
    State(s): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Response {
    info!("POST /api/generate {:?}", req.course_ids);

    let limit = req.limit.unwrap_or(DEFAULT_RESULT_LIMIT).min(DEFAULT_RESULT_LIMIT);
    match generate_schedules(s.catalog.as_ref(), &req.course_ids, limit).await {
        Ok(schedules) => (StatusCode::OK, Json(schedules)).into_response(),
        Err(e @ GenerateError::TooManyCourses { .. }) => {
            bad_request("Too many courses selected", Some(e.to_string()))
        }
        Err(e @ GenerateError::Lookup { .. }) => {
            warn!(error = %e, "Generation failed");
            let status = match &e {
                GenerateError::Lookup { source, .. } if source.is_retryable() => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            ApiErrorType::from((status, "Failed to load sections", Some(e.to_string())))
                .into_response()
        }
    }
}
