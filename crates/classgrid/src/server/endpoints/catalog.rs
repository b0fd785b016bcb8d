use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::LookupError;
use crate::server::types::ApiErrorType;
use crate::server::AppState;

/// Queries shorter than this return no results
const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct SectionsParams {
    #[serde(rename = "courseID")]
    pub course_id: Option<String>,
}

/// 503 when retrying the lookup might succeed, 502 otherwise.
fn lookup_error_to_response(error: LookupError) -> Response {
    let status = if error.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_GATEWAY
    };
    ApiErrorType::from((status, "Catalog lookup failed", Some(error.to_string()))).into_response()
}

/// GET /api/search?q=
pub async fn get_search(
    Query(params): Query<SearchParams>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /api/search?q={}", params.q);

    let query = params.q.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return (StatusCode::OK, Json(Vec::<()>::new())).into_response();
    }

    match s.catalog.search_courses(query).await {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e) => {
            warn!(query = %query, error = %e, "Search failed");
            lookup_error_to_response(e)
        }
    }
}

/// GET /api/sections?courseID=
pub async fn get_sections(
    Query(params): Query<SectionsParams>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let Some(course_id) = params
        .course_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    else {
        return ApiErrorType::from((StatusCode::BAD_REQUEST, "courseID is required", None))
            .into_response();
    };
    info!("GET /api/sections?courseID={}", course_id);

    match s.catalog.sections_for_course(course_id).await {
        Ok(sections) => (StatusCode::OK, Json(sections)).into_response(),
        Err(e) => {
            warn!(course_id = %course_id, error = %e, "Sections lookup failed");
            lookup_error_to_response(e)
        }
    }
}
