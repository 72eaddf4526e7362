//! Row types and DTOs for attendees, suggestions and meetings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::matching::PairKey;
use crate::matching::aggregate::Criterion;

/// An attendee record as provided by the registration collaborator.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AttendeeRecord {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub company: Option<String>,
    pub ticket_type: Option<String>,
    /// Free-form profile bag; see [`crate::matching::profile`] for the keys read.
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Dismissed,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MeetingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled meetings are history and never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Explanation attached to a suggestion or AI-scheduled meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct MatchMeta {
    pub tags: Vec<String>,
    pub breakdown: Vec<Criterion>,
    pub insights: Vec<String>,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Suggestion {
    pub id: i32,
    pub event_id: i32,
    pub attendee_a_id: i32,
    pub attendee_b_id: i32,
    pub score: i32,
    pub status: SuggestionStatus,
    pub meta: MatchMeta,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.attendee_a_id, self.attendee_b_id)
    }
}

/// A suggestion selected by a generation run, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSuggestion {
    pub pair: PairKey,
    pub score: i32,
    pub meta: MatchMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Meeting {
    pub id: i32,
    pub event_id: i32,
    pub attendee_a_id: i32,
    pub attendee_b_id: i32,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub status: MeetingStatus,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    pub match_score: Option<i32>,
    pub meta: MatchMeta,
}

impl Meeting {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.attendee_a_id, self.attendee_b_id)
    }
}

/// Meeting values to write. `id` selects an update instead of an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingDraft {
    pub id: Option<i32>,
    pub event_id: i32,
    pub pair: PairKey,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub status: MeetingStatus,
    pub is_ai: bool,
    pub match_score: Option<i32>,
    pub meta: MatchMeta,
}

/// Message handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub event_id: i32,
    pub title: String,
    pub message: String,
    pub channel: String,
    pub audience: String,
}
