/// API route modules
pub mod download;
pub mod health;
pub mod mastering;
pub mod presets;

use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// Build the HTTP router
pub fn router(app_state: AppState) -> Router {
    let upload_limit = app_state.config.server.max_upload_bytes();

    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/presets", get(presets::list_presets))
        .route(
            "/master",
            post(mastering::submit).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/master/:id", get(mastering::get_result))
        .route("/master/:id/status", get(mastering::get_status));

    Router::new()
        .nest("/api", api_routes)
        .route("/download/:filename", get(download::download))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
