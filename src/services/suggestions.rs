//! Read-side operations and suggestion review.

use serde::Serialize;
use tracing::{info, instrument};
use ts_rs::TS;

use super::{Matchmaker, MatchingError};
use crate::data::models::{Meeting, Suggestion, SuggestionStatus};
use crate::matching::aggregate::{Criterion, score_pair};
use crate::matching::profile::AttendeeProfile;

/// Compatibility of one attendee pair, computed on demand.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PairExplanation {
    pub attendee_a_id: i32,
    pub attendee_b_id: i32,
    pub score: i32,
    pub has_signal: bool,
    pub tags: Vec<String>,
    pub insights: Vec<String>,
    pub topics: Vec<String>,
    pub breakdown: Vec<Criterion>,
}

impl Matchmaker {
    pub async fn list_suggestions(
        &self,
        event_id: i32,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>, MatchingError> {
        Ok(self.store.suggestions(event_id, status).await?)
    }

    pub async fn list_meetings(&self, event_id: i32) -> Result<Vec<Meeting>, MatchingError> {
        Ok(self.store.meetings(event_id).await?)
    }

    /// Mark a pending suggestion dismissed. Accepted or dismissed suggestions
    /// are history and conflict.
    #[instrument(skip(self))]
    pub async fn dismiss(&self, event_id: i32, suggestion_id: i32) -> Result<(), MatchingError> {
        let dismissed = self
            .store
            .transition_suggestion(
                event_id,
                suggestion_id,
                SuggestionStatus::Pending,
                SuggestionStatus::Dismissed,
            )
            .await?;

        if !dismissed {
            let current = self
                .store
                .suggestion(event_id, suggestion_id)
                .await?
                .ok_or(MatchingError::NotFound("suggestion"))?;
            return Err(MatchingError::Conflict(format!(
                "suggestion {suggestion_id} is already {}",
                current.status.as_str()
            )));
        }

        info!(event_id, suggestion_id, "Suggestion dismissed");
        Ok(())
    }

    /// Score two attendees with the event's current weights. Nothing is stored.
    pub async fn explain(
        &self,
        event_id: i32,
        a: i32,
        b: i32,
    ) -> Result<PairExplanation, MatchingError> {
        if a == b {
            return Err(MatchingError::Validation(
                "cannot score an attendee against themselves".to_string(),
            ));
        }

        let settings = self.settings(event_id).await?;
        let attendees = self.store.attendees(event_id).await?;
        let find = |id: i32| {
            attendees
                .iter()
                .find(|r| r.id == id)
                .map(AttendeeProfile::from_record)
                .ok_or(MatchingError::NotFound("attendee"))
        };
        let (profile_a, profile_b) = (find(a)?, find(b)?);

        let result = score_pair(&profile_a, &profile_b, &settings.weights);
        Ok(PairExplanation {
            attendee_a_id: a,
            attendee_b_id: b,
            score: result.score,
            has_signal: result.has_signal,
            tags: result.tags,
            insights: result.insights,
            topics: result.topics,
            breakdown: result.breakdown,
        })
    }
}
