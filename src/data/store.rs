//! Storage contracts consumed by the matching services.
//!
//! Services only see these traits; [`crate::data::postgres::PgMatchStore`] is the
//! production implementation and the integration tests provide an in-memory one.

use async_trait::async_trait;

use crate::data::models::{
    AttendeeRecord, Meeting, MeetingDraft, MeetingStatus, NewSuggestion, Notification,
    Suggestion, SuggestionStatus,
};
use crate::matching::PairKey;
use crate::matching::settings::{LastRun, MatchingSettings};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {what}")]
    Fetch {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to write {what}")]
    Write {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    /// `map_err` adapter for read failures.
    pub fn fetch<E>(what: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        move |err| Self::Fetch {
            what,
            source: err.into(),
        }
    }

    /// `map_err` adapter for write failures.
    pub fn write<E>(what: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        move |err| Self::Write {
            what,
            source: err.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent state of the matching engine, scoped per event.
#[async_trait]
pub trait MatchStore: Send + Sync + 'static {
    /// Open a generation run for `event_id`. Runs for the same event are
    /// serialized: a second call waits until the first commits or is dropped.
    async fn begin_run(&self, event_id: i32) -> StoreResult<Box<dyn RunTransaction>>;

    /// Cheap connectivity check for health reporting.
    async fn ping(&self) -> StoreResult<()>;

    async fn attendees(&self, event_id: i32) -> StoreResult<Vec<AttendeeRecord>>;

    /// Suggestions of the event, optionally filtered by status, best score first.
    async fn suggestions(
        &self,
        event_id: i32,
        status: Option<SuggestionStatus>,
    ) -> StoreResult<Vec<Suggestion>>;

    async fn suggestion(&self, event_id: i32, id: i32) -> StoreResult<Option<Suggestion>>;

    async fn meetings(&self, event_id: i32) -> StoreResult<Vec<Meeting>>;

    async fn meeting(&self, event_id: i32, id: i32) -> StoreResult<Option<Meeting>>;

    /// The raw stored settings document, if one was ever written.
    async fn load_settings(&self, event_id: i32) -> StoreResult<Option<serde_json::Value>>;

    /// Write the configurable part of the settings. A stored `lastRun` is
    /// left untouched; only [`MatchStore::save_last_run`] writes it.
    async fn save_settings(&self, event_id: i32, settings: &MatchingSettings) -> StoreResult<()>;

    /// Replace only the `lastRun` entry of the settings document.
    async fn save_last_run(&self, event_id: i32, last_run: &LastRun) -> StoreResult<()>;

    /// Move a suggestion from `from` to `to`. Returns `false` when the
    /// suggestion is not in state `from` (or does not exist).
    async fn transition_suggestion(
        &self,
        event_id: i32,
        id: i32,
        from: SuggestionStatus,
        to: SuggestionStatus,
    ) -> StoreResult<bool>;

    /// Insert or update a meeting and, when `accept_suggestion` is set, mark
    /// that pending suggestion accepted. Both writes commit together.
    ///
    /// Updating a terminal meeting, or accepting a suggestion that is no
    /// longer pending, fails with [`StoreError::Conflict`].
    async fn save_meeting(
        &self,
        draft: &MeetingDraft,
        accept_suggestion: Option<i32>,
    ) -> StoreResult<Meeting>;

    /// Set the status of a non-terminal meeting. `None` when the meeting is
    /// missing or already terminal.
    async fn set_meeting_status(
        &self,
        event_id: i32,
        id: i32,
        status: MeetingStatus,
    ) -> StoreResult<Option<Meeting>>;

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;
}

/// One atomic generation run. Dropping it without [`commit`](Self::commit)
/// discards every change.
#[async_trait]
pub trait RunTransaction: Send {
    /// Delete every pending suggestion of the event; returns the count.
    async fn clear_pending(&mut self) -> StoreResult<u64>;

    async fn attendees(&mut self) -> StoreResult<Vec<AttendeeRecord>>;

    /// Pair keys of every remaining suggestion (any status) and every meeting.
    async fn existing_pairs(&mut self) -> StoreResult<Vec<PairKey>>;

    async fn insert_suggestions(&mut self, suggestions: &[NewSuggestion]) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
