use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::AppState;

mod handlers;
mod models;

/// Uploads are bounded; a recorded activity of around 10^5 points stays well
/// under this.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/track/upload", post(handlers::upload))
        .route("/api/track/undo", post(handlers::undo))
        .route("/api/track/redo", post(handlers::redo))
        .route("/api/track/reset", post(handlers::reset))
        .route(
            "/api/track/normalize/preview",
            post(handlers::normalize_preview),
        )
        .route(
            "/api/track/normalize/apply",
            post(handlers::normalize_apply),
        )
        .route("/api/track/add_point", post(handlers::add_point))
        .route("/api/track/update_time", post(handlers::update_time))
        .route("/api/track/reroute", post(handlers::reroute))
        .route("/api/track/trim", post(handlers::trim))
        .route("/api/track/merge", post(handlers::merge))
        .route("/api/track/export", get(handlers::export))
        .route("/api/track/session", delete(handlers::delete_session))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
