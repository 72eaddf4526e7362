//! Meeting scheduling and meeting status transitions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use ts_rs::TS;

use super::notify::{AUDIENCE_ATTENDEES, CHANNEL_IN_APP};
use super::{Matchmaker, MatchingError};
use crate::data::models::{
    AttendeeRecord, MatchMeta, Meeting, MeetingDraft, MeetingStatus, Notification, Suggestion,
    SuggestionStatus,
};
use crate::matching::PairKey;

pub const DEFAULT_DURATION_MINUTES: i64 = 30;
pub const MIN_DURATION_MINUTES: i64 = 5;
const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Scheduling request. With neither a pair nor a suggestion the best pending
/// suggestion is used, then the first two attendees of the event.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub attendee_a_id: Option<i32>,
    #[serde(default)]
    pub attendee_b_id: Option<i32>,
    #[serde(default)]
    pub suggestion_id: Option<i32>,
    /// Reschedule this meeting instead of creating a new one.
    #[serde(default)]
    pub meeting_id: Option<i32>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScheduledMeeting {
    pub meeting: Meeting,
    /// Suggestion marked accepted by this scheduling, if any.
    pub accepted_suggestion_id: Option<i32>,
    pub notified: bool,
}

/// The pair a meeting will be created for, and where it came from.
#[derive(Debug)]
struct ResolvedPair {
    pair: PairKey,
    suggestion: Option<Suggestion>,
}

/// Start and end of a meeting. Without a start both stay empty.
///
/// Fails when the end would fall outside the representable time range.
pub fn meeting_window(
    start_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i64>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), MatchingError> {
    let minutes = duration_minutes
        .unwrap_or(DEFAULT_DURATION_MINUTES)
        .clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES);
    let Some(start) = start_at else {
        return Ok((None, None));
    };
    let end = start
        .checked_add_signed(Duration::minutes(minutes))
        .ok_or_else(|| MatchingError::Validation("startAt out of range".to_string()))?;
    Ok((Some(start), Some(end)))
}

fn display_name(attendees: &HashMap<i32, &AttendeeRecord>, id: i32) -> String {
    attendees
        .get(&id)
        .map(|a| a.name.clone())
        .unwrap_or_else(|| format!("Attendee #{id}"))
}

impl Matchmaker {
    /// Create or reschedule a confirmed meeting for one pair.
    #[instrument(skip(self, request))]
    pub async fn schedule(
        &self,
        event_id: i32,
        request: ScheduleRequest,
    ) -> Result<ScheduledMeeting, MatchingError> {
        let existing = match request.meeting_id {
            Some(meeting_id) => {
                let meeting = self
                    .store
                    .meeting(event_id, meeting_id)
                    .await?
                    .ok_or(MatchingError::NotFound("meeting"))?;
                if meeting.status.is_terminal() {
                    return Err(MatchingError::Conflict(format!(
                        "meeting {meeting_id} is {} and cannot be rescheduled",
                        meeting.status.as_str()
                    )));
                }
                Some(meeting)
            }
            None => None,
        };

        let (start_at, end_at) = meeting_window(request.start_at, request.duration_minutes)?;

        let attendees = self.store.attendees(event_id).await?;
        let by_id: HashMap<i32, &AttendeeRecord> = attendees.iter().map(|a| (a.id, a)).collect();

        let resolved = self
            .resolve_pair(event_id, &request, &attendees, existing.as_ref())
            .await?;
        let origin_id = resolved.suggestion.as_ref().map(|s| s.id);

        // A fresh suggestion supplies the match data; a reschedule of the same
        // pair keeps what the meeting already carries.
        let (is_ai, match_score, meta) = match (resolved.suggestion, &existing) {
            (Some(s), _) => (s.score > 0, Some(s.score), s.meta),
            (None, Some(m)) if m.pair_key() == resolved.pair => {
                (m.is_ai, m.match_score, m.meta.clone())
            }
            (None, _) => (false, None, MatchMeta::default()),
        };

        let draft = MeetingDraft {
            id: request.meeting_id,
            event_id,
            pair: resolved.pair,
            start_at,
            end_at,
            location: request.location.filter(|l| !l.trim().is_empty()),
            status: MeetingStatus::Confirmed,
            is_ai,
            match_score,
            meta,
        };

        let meeting = self.store.save_meeting(&draft, origin_id).await?;
        info!(
            event_id,
            meeting_id = meeting.id,
            pair = %resolved.pair,
            suggestion_id = ?origin_id,
            is_ai = meeting.is_ai,
            "Meeting scheduled"
        );

        let name_a = display_name(&by_id, resolved.pair.low());
        let name_b = display_name(&by_id, resolved.pair.high());
        let when = match meeting.start_at {
            Some(start) => format!(" at {}", start.format("%Y-%m-%d %H:%M UTC")),
            None => String::new(),
        };
        let place = match &meeting.location {
            Some(location) => format!(" ({location})"),
            None => String::new(),
        };
        let notification = Notification {
            event_id,
            title: "Meeting scheduled".to_string(),
            message: format!("{name_a} and {name_b} are meeting{when}{place}."),
            channel: CHANNEL_IN_APP.to_string(),
            audience: AUDIENCE_ATTENDEES.to_string(),
        };
        let notified = self.notifier.send(&notification).await;
        if !notified {
            warn!(
                event_id,
                meeting_id = meeting.id,
                "Meeting notification was not delivered"
            );
        }

        Ok(ScheduledMeeting {
            meeting,
            accepted_suggestion_id: origin_id,
            notified,
        })
    }

    async fn resolve_pair(
        &self,
        event_id: i32,
        request: &ScheduleRequest,
        attendees: &[AttendeeRecord],
        existing: Option<&Meeting>,
    ) -> Result<ResolvedPair, MatchingError> {
        match (request.attendee_a_id, request.attendee_b_id) {
            (Some(a), Some(b)) => {
                if a == b {
                    return Err(MatchingError::Validation(
                        "a meeting needs two different attendees".to_string(),
                    ));
                }
                for id in [a, b] {
                    if !attendees.iter().any(|r| r.id == id) {
                        return Err(MatchingError::Validation(format!(
                            "attendee {id} is not registered for event {event_id}"
                        )));
                    }
                }
                let pair = PairKey::new(a, b);
                let suggestion = self
                    .store
                    .suggestions(event_id, Some(SuggestionStatus::Pending))
                    .await?
                    .into_iter()
                    .find(|s| s.pair_key() == pair);
                return Ok(ResolvedPair { pair, suggestion });
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(MatchingError::Validation(
                    "both attendeeAId and attendeeBId are required".to_string(),
                ));
            }
            (None, None) => {}
        }

        if let Some(suggestion_id) = request.suggestion_id {
            let suggestion = self
                .store
                .suggestion(event_id, suggestion_id)
                .await?
                .ok_or(MatchingError::NotFound("suggestion"))?;
            if suggestion.status != SuggestionStatus::Pending {
                return Err(MatchingError::Conflict(format!(
                    "suggestion {suggestion_id} is already {}",
                    suggestion.status.as_str()
                )));
            }
            return Ok(ResolvedPair {
                pair: suggestion.pair_key(),
                suggestion: Some(suggestion),
            });
        }

        // A reschedule without a new pair stays with the meeting's attendees.
        if let Some(meeting) = existing {
            return Ok(ResolvedPair {
                pair: meeting.pair_key(),
                suggestion: None,
            });
        }

        // Store order is best score first, oldest first.
        let pending = self
            .store
            .suggestions(event_id, Some(SuggestionStatus::Pending))
            .await?;
        if let Some(suggestion) = pending.into_iter().next() {
            return Ok(ResolvedPair {
                pair: suggestion.pair_key(),
                suggestion: Some(suggestion),
            });
        }

        let mut ids: Vec<i32> = attendees.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        match ids.as_slice() {
            [a, b, ..] => Ok(ResolvedPair {
                pair: PairKey::new(*a, *b),
                suggestion: None,
            }),
            _ => Err(MatchingError::Validation(
                "at least two attendees are needed to schedule a meeting".to_string(),
            )),
        }
    }

    /// Move a non-terminal meeting to a new status.
    #[instrument(skip(self))]
    pub async fn set_meeting_status(
        &self,
        event_id: i32,
        meeting_id: i32,
        status: MeetingStatus,
    ) -> Result<Meeting, MatchingError> {
        let current = self
            .store
            .meeting(event_id, meeting_id)
            .await?
            .ok_or(MatchingError::NotFound("meeting"))?;
        if current.status.is_terminal() {
            return Err(MatchingError::Conflict(format!(
                "meeting {meeting_id} is already {}",
                current.status.as_str()
            )));
        }

        let updated = self
            .store
            .set_meeting_status(event_id, meeting_id, status)
            .await?
            .ok_or_else(|| {
                MatchingError::Conflict(format!("meeting {meeting_id} changed concurrently"))
            })?;

        info!(
            event_id,
            meeting_id,
            from = current.status.as_str(),
            to = status.as_str(),
            "Meeting status updated"
        );
        Ok(updated)
    }
}
