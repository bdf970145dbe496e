use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    pub company: Option<String>,
}

/// Streams one JSON object per pipeline event, newline-delimited. The
/// company parameter is validated before any pipeline work starts.
pub async fn analyze_company_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyzeParams>,
) -> Response {
    let company = params.company.unwrap_or_default();
    let company = company.trim();
    if company.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "company parameter is required" })),
        )
            .into_response();
    }

    info!(company, "Starting analysis run");
    let lines = state
        .pipeline
        .run(company.to_string())
        .map(|event| Ok::<_, Infallible>(format!("{}\n", event.to_json_line())));

    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(lines),
    )
        .into_response()
}

pub async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}
