//! Postgres implementation of [`MatchStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::data::models::{
    AttendeeRecord, MatchMeta, Meeting, MeetingDraft, MeetingStatus, NewSuggestion,
    Notification, Suggestion, SuggestionStatus,
};
use crate::data::store::{MatchStore, RunTransaction, StoreError, StoreResult};
use crate::matching::PairKey;
use crate::matching::settings::{LastRun, MatchingSettings};

/// First key of the two-part advisory lock that serializes generation runs;
/// the event ID is the second.
const RUN_LOCK_NAMESPACE: i32 = 0x4d41_5443;

const SUGGESTION_COLUMNS: &str =
    "id, event_id, attendee_a_id, attendee_b_id, score, status, meta, created_at";

const MEETING_COLUMNS: &str = "id, event_id, attendee_a_id, attendee_b_id, start_at, end_at, \
     location, status, is_ai, match_score, meta";

#[derive(sqlx::FromRow)]
struct SuggestionRow {
    id: i32,
    event_id: i32,
    attendee_a_id: i32,
    attendee_b_id: i32,
    score: i32,
    status: String,
    meta: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<SuggestionRow> for Suggestion {
    type Error = StoreError;

    fn try_from(row: SuggestionRow) -> StoreResult<Self> {
        let status = SuggestionStatus::parse(&row.status).ok_or_else(|| StoreError::Fetch {
            what: "suggestions",
            source: anyhow::anyhow!("unknown suggestion status '{}'", row.status),
        })?;
        Ok(Suggestion {
            id: row.id,
            event_id: row.event_id,
            attendee_a_id: row.attendee_a_id,
            attendee_b_id: row.attendee_b_id,
            score: row.score,
            status,
            meta: parse_meta(row.meta),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MeetingRow {
    id: i32,
    event_id: i32,
    attendee_a_id: i32,
    attendee_b_id: i32,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    location: Option<String>,
    status: String,
    is_ai: bool,
    match_score: Option<i32>,
    meta: serde_json::Value,
}

impl TryFrom<MeetingRow> for Meeting {
    type Error = StoreError;

    fn try_from(row: MeetingRow) -> StoreResult<Self> {
        let status = MeetingStatus::parse(&row.status).ok_or_else(|| StoreError::Fetch {
            what: "meetings",
            source: anyhow::anyhow!("unknown meeting status '{}'", row.status),
        })?;
        Ok(Meeting {
            id: row.id,
            event_id: row.event_id,
            attendee_a_id: row.attendee_a_id,
            attendee_b_id: row.attendee_b_id,
            start_at: row.start_at,
            end_at: row.end_at,
            location: row.location,
            status,
            is_ai: row.is_ai,
            match_score: row.match_score,
            meta: parse_meta(row.meta),
        })
    }
}

/// Stored meta is display-only; a malformed document degrades to empty.
fn parse_meta(value: serde_json::Value) -> MatchMeta {
    serde_json::from_value(value).unwrap_or_default()
}

fn meta_json(meta: &MatchMeta) -> serde_json::Value {
    serde_json::to_value(meta).unwrap_or_else(|_| serde_json::json!({}))
}

#[derive(Clone)]
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn fetch_attendees<'e, E>(executor: E, event_id: i32) -> StoreResult<Vec<AttendeeRecord>>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, AttendeeRecord>(
        "SELECT id, event_id, name, company, ticket_type, metadata \
         FROM event_attendees WHERE event_id = $1 ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(executor)
    .await
    .map_err(StoreError::fetch("attendees"))
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn begin_run(&self, event_id: i32) -> StoreResult<Box<dyn RunTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::write("generation run"))?;

        // Held until commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(RUN_LOCK_NAMESPACE)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write("generation lock"))?;

        debug!(event_id, "Acquired generation lock");
        Ok(Box::new(PgRun { tx, event_id }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::fetch("database ping"))?;
        Ok(())
    }

    async fn attendees(&self, event_id: i32) -> StoreResult<Vec<AttendeeRecord>> {
        fetch_attendees(&self.pool, event_id).await
    }

    async fn suggestions(
        &self,
        event_id: i32,
        status: Option<SuggestionStatus>,
    ) -> StoreResult<Vec<Suggestion>> {
        let rows: Vec<SuggestionRow> = sqlx::query_as(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM match_suggestions \
             WHERE event_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY score DESC, created_at, id"
        ))
        .bind(event_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch("suggestions"))?;

        rows.into_iter().map(Suggestion::try_from).collect()
    }

    async fn suggestion(&self, event_id: i32, id: i32) -> StoreResult<Option<Suggestion>> {
        let row: Option<SuggestionRow> = sqlx::query_as(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM match_suggestions WHERE event_id = $1 AND id = $2"
        ))
        .bind(event_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::fetch("suggestion"))?;

        row.map(Suggestion::try_from).transpose()
    }

    async fn meetings(&self, event_id: i32) -> StoreResult<Vec<Meeting>> {
        let rows: Vec<MeetingRow> = sqlx::query_as(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE event_id = $1 \
             ORDER BY start_at NULLS LAST, id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch("meetings"))?;

        rows.into_iter().map(Meeting::try_from).collect()
    }

    async fn meeting(&self, event_id: i32, id: i32) -> StoreResult<Option<Meeting>> {
        let row: Option<MeetingRow> = sqlx::query_as(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE event_id = $1 AND id = $2"
        ))
        .bind(event_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::fetch("meeting"))?;

        row.map(Meeting::try_from).transpose()
    }

    async fn load_settings(&self, event_id: i32) -> StoreResult<Option<serde_json::Value>> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT settings FROM matching_settings WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::fetch("matching settings"))
    }

    async fn save_settings(&self, event_id: i32, settings: &MatchingSettings) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO matching_settings (event_id, settings)
            VALUES ($1, $2::jsonb - 'lastRun')
            ON CONFLICT (event_id)
            DO UPDATE SET
                settings = EXCLUDED.settings || CASE
                    WHEN matching_settings.settings ? 'lastRun'
                    THEN jsonb_build_object('lastRun', matching_settings.settings -> 'lastRun')
                    ELSE '{}'::jsonb
                END,
                updated_at = now()
            "#,
        )
        .bind(event_id)
        .bind(settings.to_json())
        .execute(&self.pool)
        .await
        .map_err(StoreError::write("matching settings"))?;
        Ok(())
    }

    async fn save_last_run(&self, event_id: i32, last_run: &LastRun) -> StoreResult<()> {
        let value =
            serde_json::to_value(last_run).map_err(StoreError::write("matching last run"))?;

        sqlx::query(
            r#"
            INSERT INTO matching_settings (event_id, settings)
            VALUES ($1, jsonb_build_object('lastRun', $2::jsonb))
            ON CONFLICT (event_id)
            DO UPDATE SET
                settings = jsonb_set(matching_settings.settings, '{lastRun}', $2::jsonb),
                updated_at = now()
            "#,
        )
        .bind(event_id)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write("matching last run"))?;
        Ok(())
    }

    async fn transition_suggestion(
        &self,
        event_id: i32,
        id: i32,
        from: SuggestionStatus,
        to: SuggestionStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE match_suggestions SET status = $4, resolved_at = now() \
             WHERE event_id = $1 AND id = $2 AND status = $3",
        )
        .bind(event_id)
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::write("suggestion status"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_meeting(
        &self,
        draft: &MeetingDraft,
        accept_suggestion: Option<i32>,
    ) -> StoreResult<Meeting> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::write("meeting"))?;

        // Both statements share $1..$10; the update adds the meeting ID as $11.
        let sql = match draft.id {
            Some(_) => format!(
                r#"
                UPDATE meetings
                SET attendee_a_id = $2, attendee_b_id = $3, start_at = $4, end_at = $5,
                    location = $6, status = $7, is_ai = $8, match_score = $9, meta = $10,
                    updated_at = now()
                WHERE event_id = $1 AND id = $11 AND status NOT IN ('completed', 'cancelled')
                RETURNING {MEETING_COLUMNS}
                "#
            ),
            None => format!(
                r#"
                INSERT INTO meetings
                    (event_id, attendee_a_id, attendee_b_id, start_at, end_at,
                     location, status, is_ai, match_score, meta)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING {MEETING_COLUMNS}
                "#
            ),
        };

        let mut query = sqlx::query_as::<_, MeetingRow>(&sql)
            .bind(draft.event_id)
            .bind(draft.pair.low())
            .bind(draft.pair.high())
            .bind(draft.start_at)
            .bind(draft.end_at)
            .bind(draft.location.as_deref())
            .bind(draft.status.as_str())
            .bind(draft.is_ai)
            .bind(draft.match_score)
            .bind(meta_json(&draft.meta));
        if let Some(meeting_id) = draft.id {
            query = query.bind(meeting_id);
        }

        let row = query
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::write("meeting"))?;

        let Some(row) = row else {
            return Err(StoreError::Conflict(
                "meeting is missing or already completed/cancelled".to_string(),
            ));
        };

        if let Some(suggestion_id) = accept_suggestion {
            let accepted = sqlx::query(
                "UPDATE match_suggestions SET status = 'accepted', resolved_at = now() \
                 WHERE event_id = $1 AND id = $2 AND status = 'pending'",
            )
            .bind(draft.event_id)
            .bind(suggestion_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write("suggestion status"))?
            .rows_affected();

            if accepted != 1 {
                return Err(StoreError::Conflict(format!(
                    "suggestion {suggestion_id} is no longer pending"
                )));
            }
        }

        tx.commit().await.map_err(StoreError::write("meeting"))?;
        Meeting::try_from(row)
    }

    async fn set_meeting_status(
        &self,
        event_id: i32,
        id: i32,
        status: MeetingStatus,
    ) -> StoreResult<Option<Meeting>> {
        let row: Option<MeetingRow> = sqlx::query_as(&format!(
            "UPDATE meetings SET status = $3, updated_at = now() \
             WHERE event_id = $1 AND id = $2 AND status NOT IN ('completed', 'cancelled') \
             RETURNING {MEETING_COLUMNS}"
        ))
        .bind(event_id)
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::write("meeting status"))?;

        row.map(Meeting::try_from).transpose()
    }

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO notifications (event_id, title, message, channel, audience) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(notification.event_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.channel)
        .bind(&notification.audience)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write("notification"))?;
        Ok(())
    }
}

/// A generation run holding the per-event advisory lock.
struct PgRun {
    tx: Transaction<'static, Postgres>,
    event_id: i32,
}

#[async_trait]
impl RunTransaction for PgRun {
    async fn clear_pending(&mut self) -> StoreResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM match_suggestions WHERE event_id = $1 AND status = 'pending'",
        )
        .bind(self.event_id)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::write("pending suggestions"))?
        .rows_affected();
        Ok(deleted)
    }

    async fn attendees(&mut self) -> StoreResult<Vec<AttendeeRecord>> {
        fetch_attendees(&mut *self.tx, self.event_id).await
    }

    async fn existing_pairs(&mut self) -> StoreResult<Vec<PairKey>> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT attendee_a_id, attendee_b_id FROM match_suggestions WHERE event_id = $1
            UNION
            SELECT attendee_a_id, attendee_b_id FROM meetings WHERE event_id = $1
            "#,
        )
        .bind(self.event_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::fetch("existing pairs"))?;

        Ok(rows.into_iter().map(|(a, b)| PairKey::new(a, b)).collect())
    }

    async fn insert_suggestions(&mut self, suggestions: &[NewSuggestion]) -> StoreResult<u64> {
        if suggestions.is_empty() {
            return Ok(0);
        }

        let a_ids: Vec<i32> = suggestions.iter().map(|s| s.pair.low()).collect();
        let b_ids: Vec<i32> = suggestions.iter().map(|s| s.pair.high()).collect();
        let scores: Vec<i32> = suggestions.iter().map(|s| s.score).collect();
        let metas: Vec<serde_json::Value> = suggestions.iter().map(|s| meta_json(&s.meta)).collect();

        let inserted = sqlx::query(
            r#"
            INSERT INTO match_suggestions (event_id, attendee_a_id, attendee_b_id, score, status, meta)
            SELECT $1, v.attendee_a_id, v.attendee_b_id, v.score, 'pending', v.meta
            FROM UNNEST($2::int4[], $3::int4[], $4::int4[], $5::jsonb[])
                AS v(attendee_a_id, attendee_b_id, score, meta)
            "#,
        )
        .bind(self.event_id)
        .bind(&a_ids)
        .bind(&b_ids)
        .bind(&scores)
        .bind(&metas)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::write("suggestions"))?
        .rows_affected();

        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(StoreError::write("generation run"))
    }
}
