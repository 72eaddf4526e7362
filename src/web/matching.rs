//! Matchmaking API handlers.
//!
//! Thin HTTP wrappers over [`crate::services::Matchmaker`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use ts_rs::TS;

use crate::data::models::{Meeting, MeetingStatus, Suggestion, SuggestionStatus};
use crate::matching::settings::{MatchingSettings, SettingsUpdate};
use crate::services::{PairExplanation, RunStats, ScheduleRequest, ScheduledMeeting};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};

#[derive(Debug, Deserialize, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SuggestionListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, TS)]
#[ts(export)]
pub struct ScorePairParams {
    pub a: i32,
    pub b: i32,
}

#[derive(Debug, Deserialize, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MeetingStatusBody {
    pub status: MeetingStatus,
}

/// Simple acknowledgement response for mutating operations.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OkResponse {
    pub ok: bool,
}

/// `GET /api/events/{eventId}/matching/settings`
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn get_settings(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<MatchingSettings>, ApiError> {
    Ok(Json(state.matchmaker.settings(event_id).await?))
}

/// `PUT /api/events/{eventId}/matching/settings`
///
/// Fields left out of the body keep their current value.
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn put_settings(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<MatchingSettings>, ApiError> {
    let update: SettingsUpdate = serde_path_to_error::deserialize(&body).map_err(|e| {
        ApiError::new(
            ApiErrorCode::InvalidSettings,
            format!("invalid value at '{}': {}", e.path(), e.inner()),
        )
    })?;

    let settings = state.matchmaker.update_settings(event_id, update).await?;
    Ok(Json(settings))
}

/// `POST /api/events/{eventId}/matching/generate`
///
/// Always answers 200; a failed run reports zero stats.
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn generate(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Json<RunStats> {
    info!(event_id, "Generation run requested");
    let cancel = state.shutdown.child_token();
    Json(state.matchmaker.generate(event_id, &cancel).await)
}

/// `GET /api/events/{eventId}/matching/suggestions?status=`
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn list_suggestions(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Query(params): Query<SuggestionListParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let status = match params.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(SuggestionStatus::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!(
                "unknown status '{raw}' (expected pending, accepted or dismissed)"
            ))
        })?),
    };

    Ok(Json(state.matchmaker.list_suggestions(event_id, status).await?))
}

/// `POST /api/events/{eventId}/matching/suggestions/{id}/dismiss`
#[instrument(skip_all, fields(event_id = event_id, suggestion_id = suggestion_id))]
pub async fn dismiss_suggestion(
    State(state): State<AppState>,
    Path((event_id, suggestion_id)): Path<(i32, i32)>,
) -> Result<Json<OkResponse>, ApiError> {
    state.matchmaker.dismiss(event_id, suggestion_id).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// `GET /api/events/{eventId}/matching/score?a=&b=`
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn score_pair(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Query(params): Query<ScorePairParams>,
) -> Result<Json<PairExplanation>, ApiError> {
    Ok(Json(
        state
            .matchmaker
            .explain(event_id, params.a, params.b)
            .await?,
    ))
}

/// `GET /api/events/{eventId}/meetings`
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn list_meetings(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Vec<Meeting>>, ApiError> {
    Ok(Json(state.matchmaker.list_meetings(event_id).await?))
}

/// `POST /api/events/{eventId}/meetings/schedule`
///
/// 201 for a new meeting, 200 for a reschedule.
#[instrument(skip_all, fields(event_id = event_id))]
pub async fn schedule_meeting(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduledMeeting>), ApiError> {
    let status = if request.meeting_id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let scheduled = state.matchmaker.schedule(event_id, request).await?;
    Ok((status, Json(scheduled)))
}

/// `POST /api/events/{eventId}/meetings/{id}/status`
#[instrument(skip_all, fields(event_id = event_id, meeting_id = meeting_id))]
pub async fn update_meeting_status(
    State(state): State<AppState>,
    Path((event_id, meeting_id)): Path<(i32, i32)>,
    Json(body): Json<MeetingStatusBody>,
) -> Result<Json<Meeting>, ApiError> {
    let meeting = state
        .matchmaker
        .set_meeting_status(event_id, meeting_id, body.status)
        .await?;
    Ok(Json(meeting))
}
