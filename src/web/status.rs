//! Health handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use tracing::{trace, warn};
use ts_rs::TS;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub commit: String,
    pub database: bool,
    pub uptime_secs: u64,
}

/// `GET /api/health`: liveness, build info and database reachability.
pub(super) async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    trace!("health check requested");

    let database = match state.matchmaker.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = ?e, "Health check could not reach the database");
            false
        }
    };

    let (code, status) = if database {
        (StatusCode::OK, HealthStatus::Healthy)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Degraded)
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: env!("GIT_COMMIT_SHORT").to_string(),
            database,
            uptime_secs: state.started_at.elapsed().as_secs(),
        }),
    )
}
