//! HTTP status surface.
//!
//! Everything here is read-only: handlers take a snapshot of the
//! [`StatusBoard`] and render it. Safe to poll as often as you like.

mod page;
mod status;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::StatusBoard;

/// Create the status router.
pub fn create_router(board: Arc<StatusBoard>) -> Router {
    Router::new()
        .merge(status::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(board)
}
