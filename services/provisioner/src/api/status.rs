//! Status endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use super::page;
use crate::state::StatusBoard;
use crate::status::{HealthReport, StatusReport};

pub fn routes() -> Router<Arc<StatusBoard>> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/status", get(api_status))
}

/// Human-readable status page.
async fn index(State(board): State<Arc<StatusBoard>>) -> impl IntoResponse {
    let report = StatusReport::capture(&board.snapshot(), Utc::now());
    Html(page::render(&report))
}

/// Liveness probe. Always 200 while the process is up, whatever the loop
/// status is.
async fn health(State(board): State<Arc<StatusBoard>>) -> impl IntoResponse {
    Json(HealthReport::capture(&board.snapshot(), Utc::now()))
}

/// Full state dump.
async fn api_status(State(board): State<Arc<StatusBoard>>) -> impl IntoResponse {
    Json(StatusReport::capture(&board.snapshot(), Utc::now()))
}
