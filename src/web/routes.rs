//! Web API router construction.

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{matching, status};

/// Upper bound for any single request, generation runs included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let event_router = Router::new()
        .route(
            "/matching/settings",
            get(matching::get_settings).put(matching::put_settings),
        )
        .route("/matching/generate", post(matching::generate))
        .route("/matching/suggestions", get(matching::list_suggestions))
        .route(
            "/matching/suggestions/{id}/dismiss",
            post(matching::dismiss_suggestion),
        )
        .route("/matching/score", get(matching::score_pair))
        .route("/meetings", get(matching::list_meetings))
        .route("/meetings/schedule", post(matching::schedule_meeting))
        .route(
            "/meetings/{id}/status",
            post(matching::update_meeting_status),
        );

    let api_router = Router::new()
        .route("/health", get(status::health))
        .nest("/events/{event_id}", event_router)
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CorsLayer::permissive(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(REQUEST_TIMEOUT),
    ))
}
