//! Shared test helpers: an in-memory [`MatchStore`] and a recording notifier.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use matchmaker::data::models::{
    AttendeeRecord, MatchMeta, Meeting, MeetingDraft, MeetingStatus, NewSuggestion, Notification,
    Suggestion, SuggestionStatus,
};
use matchmaker::data::store::{MatchStore, RunTransaction, StoreError, StoreResult};
use matchmaker::matching::PairKey;
use matchmaker::matching::settings::{LastRun, MatchingSettings};
use matchmaker::services::Matchmaker;
use matchmaker::services::notify::Notifier;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub const EVENT_ID: i32 = 1;

/// Everything the in-memory store holds, plus failure switches.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub attendees: Vec<AttendeeRecord>,
    pub suggestions: Vec<Suggestion>,
    pub meetings: Vec<Meeting>,
    pub settings: HashMap<i32, Value>,
    pub notifications: Vec<Notification>,
    pub next_id: i32,
    pub fail_attendee_reads: bool,
    pub fail_suggestion_inserts: bool,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn read_attendees(&self, event_id: i32) -> StoreResult<Vec<AttendeeRecord>> {
        if self.fail_attendee_reads {
            return Err(fetch_error("attendees"));
        }
        Ok(self
            .attendees
            .iter()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect())
    }
}

fn fetch_error(what: &'static str) -> StoreError {
    StoreError::Fetch {
        what,
        source: anyhow::anyhow!("injected read failure"),
    }
}

fn write_error(what: &'static str) -> StoreError {
    StoreError::Write {
        what,
        source: anyhow::anyhow!("injected write failure"),
    }
}

/// In-memory store. A generation run holds the whole state lock until it
/// commits or is dropped, and works on a copy so a drop rolls back.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn with_attendees(attendees: Vec<AttendeeRecord>) -> Self {
        let state = State {
            attendees,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn snapshot(&self) -> State {
        self.state.lock().await.clone()
    }

    pub async fn update(&self, f: impl FnOnce(&mut State)) {
        f(&mut *self.state.lock().await);
    }

    pub async fn add_suggestion(
        &self,
        a: i32,
        b: i32,
        score: i32,
        status: SuggestionStatus,
    ) -> i32 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let pair = PairKey::new(a, b);
        state.suggestions.push(Suggestion {
            id,
            event_id: EVENT_ID,
            attendee_a_id: pair.low(),
            attendee_b_id: pair.high(),
            score,
            status,
            meta: MatchMeta {
                tags: vec!["Industry: fintech".to_string()],
                ..Default::default()
            },
            created_at: Utc::now(),
        });
        id
    }

    pub async fn add_meeting(&self, a: i32, b: i32, status: MeetingStatus) -> i32 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let pair = PairKey::new(a, b);
        state.meetings.push(Meeting {
            id,
            event_id: EVENT_ID,
            attendee_a_id: pair.low(),
            attendee_b_id: pair.high(),
            start_at: None,
            end_at: None,
            location: None,
            status,
            is_ai: false,
            match_score: None,
            meta: MatchMeta::default(),
        });
        id
    }

    pub async fn pending(&self) -> Vec<Suggestion> {
        self.snapshot()
            .await
            .suggestions
            .into_iter()
            .filter(|s| s.status == SuggestionStatus::Pending)
            .collect()
    }
}

fn sorted_suggestions(mut suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    suggestions.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
    suggestions
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn begin_run(&self, event_id: i32) -> StoreResult<Box<dyn RunTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryRun {
            guard,
            working,
            event_id,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn attendees(&self, event_id: i32) -> StoreResult<Vec<AttendeeRecord>> {
        self.state.lock().await.read_attendees(event_id)
    }

    async fn suggestions(
        &self,
        event_id: i32,
        status: Option<SuggestionStatus>,
    ) -> StoreResult<Vec<Suggestion>> {
        let state = self.state.lock().await;
        Ok(sorted_suggestions(
            state
                .suggestions
                .iter()
                .filter(|s| s.event_id == event_id)
                .filter(|s| status.is_none_or(|wanted| s.status == wanted))
                .cloned()
                .collect(),
        ))
    }

    async fn suggestion(&self, event_id: i32, id: i32) -> StoreResult<Option<Suggestion>> {
        let state = self.state.lock().await;
        Ok(state
            .suggestions
            .iter()
            .find(|s| s.event_id == event_id && s.id == id)
            .cloned())
    }

    async fn meetings(&self, event_id: i32) -> StoreResult<Vec<Meeting>> {
        let state = self.state.lock().await;
        Ok(state
            .meetings
            .iter()
            .filter(|m| m.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn meeting(&self, event_id: i32, id: i32) -> StoreResult<Option<Meeting>> {
        let state = self.state.lock().await;
        Ok(state
            .meetings
            .iter()
            .find(|m| m.event_id == event_id && m.id == id)
            .cloned())
    }

    async fn load_settings(&self, event_id: i32) -> StoreResult<Option<Value>> {
        Ok(self.state.lock().await.settings.get(&event_id).cloned())
    }

    async fn save_settings(&self, event_id: i32, settings: &MatchingSettings) -> StoreResult<()> {
        let mut doc = settings.to_json();
        let mut state = self.state.lock().await;
        if let Some(fields) = doc.as_object_mut() {
            fields.remove("lastRun");
            if let Some(kept) = state.settings.get(&event_id).and_then(|old| old.get("lastRun")) {
                fields.insert("lastRun".to_string(), kept.clone());
            }
        }
        state.settings.insert(event_id, doc);
        Ok(())
    }

    async fn save_last_run(&self, event_id: i32, last_run: &LastRun) -> StoreResult<()> {
        let value = serde_json::to_value(last_run).map_err(StoreError::write("last run"))?;
        let mut state = self.state.lock().await;
        let doc = state.settings.entry(event_id).or_insert_with(|| Value::Object(Default::default()));
        if let Some(fields) = doc.as_object_mut() {
            fields.insert("lastRun".to_string(), value);
        }
        Ok(())
    }

    async fn transition_suggestion(
        &self,
        event_id: i32,
        id: i32,
        from: SuggestionStatus,
        to: SuggestionStatus,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .suggestions
            .iter_mut()
            .find(|s| s.event_id == event_id && s.id == id && s.status == from)
        {
            Some(suggestion) => {
                suggestion.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_meeting(
        &self,
        draft: &MeetingDraft,
        accept_suggestion: Option<i32>,
    ) -> StoreResult<Meeting> {
        let mut state = self.state.lock().await;

        let accept_index = match accept_suggestion {
            Some(id) => Some(
                state
                    .suggestions
                    .iter()
                    .position(|s| {
                        s.event_id == draft.event_id
                            && s.id == id
                            && s.status == SuggestionStatus::Pending
                    })
                    .ok_or_else(|| StoreError::Conflict(format!("suggestion {id} is not pending")))?,
            ),
            None => None,
        };

        let meeting_index = match draft.id {
            Some(id) => Some(
                state
                    .meetings
                    .iter()
                    .position(|m| {
                        m.event_id == draft.event_id && m.id == id && !m.status.is_terminal()
                    })
                    .ok_or_else(|| {
                        StoreError::Conflict(format!("meeting {id} cannot be rescheduled"))
                    })?,
            ),
            None => None,
        };

        let id = match draft.id {
            Some(id) => id,
            None => state.next_id(),
        };
        let meeting = Meeting {
            id,
            event_id: draft.event_id,
            attendee_a_id: draft.pair.low(),
            attendee_b_id: draft.pair.high(),
            start_at: draft.start_at,
            end_at: draft.end_at,
            location: draft.location.clone(),
            status: draft.status,
            is_ai: draft.is_ai,
            match_score: draft.match_score,
            meta: draft.meta.clone(),
        };

        match meeting_index {
            Some(index) => state.meetings[index] = meeting.clone(),
            None => state.meetings.push(meeting.clone()),
        }
        if let Some(index) = accept_index {
            state.suggestions[index].status = SuggestionStatus::Accepted;
        }
        Ok(meeting)
    }

    async fn set_meeting_status(
        &self,
        event_id: i32,
        id: i32,
        status: MeetingStatus,
    ) -> StoreResult<Option<Meeting>> {
        let mut state = self.state.lock().await;
        let Some(meeting) = state
            .meetings
            .iter_mut()
            .find(|m| m.event_id == event_id && m.id == id && !m.status.is_terminal())
        else {
            return Ok(None);
        };
        meeting.status = status;
        Ok(Some(meeting.clone()))
    }

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }
}

struct MemoryRun {
    guard: OwnedMutexGuard<State>,
    working: State,
    event_id: i32,
}

#[async_trait]
impl RunTransaction for MemoryRun {
    async fn clear_pending(&mut self) -> StoreResult<u64> {
        let before = self.working.suggestions.len();
        let event_id = self.event_id;
        self.working
            .suggestions
            .retain(|s| !(s.event_id == event_id && s.status == SuggestionStatus::Pending));
        Ok((before - self.working.suggestions.len()) as u64)
    }

    async fn attendees(&mut self) -> StoreResult<Vec<AttendeeRecord>> {
        self.working.read_attendees(self.event_id)
    }

    async fn existing_pairs(&mut self) -> StoreResult<Vec<PairKey>> {
        let event_id = self.event_id;
        let suggestions = self
            .working
            .suggestions
            .iter()
            .filter(|s| s.event_id == event_id)
            .map(|s| s.pair_key());
        let meetings = self
            .working
            .meetings
            .iter()
            .filter(|m| m.event_id == event_id)
            .map(|m| m.pair_key());
        Ok(suggestions.chain(meetings).collect())
    }

    async fn insert_suggestions(&mut self, suggestions: &[NewSuggestion]) -> StoreResult<u64> {
        if self.working.fail_suggestion_inserts {
            return Err(write_error("suggestions"));
        }
        let now = Utc::now();
        for new in suggestions {
            let id = self.working.next_id();
            self.working.suggestions.push(Suggestion {
                id,
                event_id: self.event_id,
                attendee_a_id: new.pair.low(),
                attendee_b_id: new.pair.high(),
                score: new.score,
                status: SuggestionStatus::Pending,
                meta: new.meta.clone(),
                created_at: now,
            });
        }
        Ok(suggestions.len() as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryRun {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

/// Notifier that keeps every message it was asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<StdMutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> bool {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        !self.fail
    }
}

pub fn attendee(id: i32, metadata: Value) -> AttendeeRecord {
    AttendeeRecord {
        id,
        event_id: EVENT_ID,
        name: format!("Attendee {id}"),
        company: None,
        ticket_type: None,
        metadata,
    }
}

/// Attendees `1..=n` with empty profiles, so every pair scores neutral.
pub fn blank_attendees(n: i32) -> Vec<AttendeeRecord> {
    (1..=n).map(|id| attendee(id, serde_json::json!({}))).collect()
}

pub fn matchmaker(store: &MemoryStore, notifier: &RecordingNotifier) -> Matchmaker {
    Matchmaker::new(Arc::new(store.clone()), Arc::new(notifier.clone()))
}
