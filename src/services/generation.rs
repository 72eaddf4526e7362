//! Generation runs: replace an event's pending suggestions with a freshly
//! selected set.
//!
//! A run happens inside one [`RunTransaction`]:
//!
//! 1. Delete every `pending` suggestion of the event.
//! 2. Read the attendee pool and the pairs that remain blocked (accepted or
//!    dismissed suggestions and all meetings).
//! 3. Score and select on a blocking thread.
//! 4. Insert the selection and commit.
//!
//! Any failure before the commit drops the transaction, leaving the previous
//! pending set in place, and the caller receives zero stats. `lastRun` and the
//! optional organizer notice are written only after a successful commit.

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use ts_rs::TS;

use super::notify::{AUDIENCE_ORGANIZERS, CHANNEL_IN_APP};
use super::{Matchmaker, MatchingError};
use crate::data::models::{AttendeeRecord, NewSuggestion, Notification};
use crate::matching::PairKey;
use crate::matching::candidates::{self, GenerationParams};
use crate::matching::selection;
use crate::matching::settings::{LastRun, MatchingSettings};
use crate::utils::fmt_duration;

/// Outcome of a generation run as reported to the console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RunStats {
    pub created: i32,
    pub avg_score: i32,
    pub attendees_matched: i32,
    /// Fallbacks taken during the run, for display.
    pub advisories: Vec<String>,
}

/// Suggestions chosen for insertion, with their statistics.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub selected: Vec<NewSuggestion>,
    pub stats: RunStats,
}

/// Pure part of a run: score the pool and pick the suggestions to insert.
pub fn plan_run(
    attendees: &[AttendeeRecord],
    existing: &[PairKey],
    settings: &MatchingSettings,
) -> RunPlan {
    let blocked: HashSet<PairKey> = existing.iter().copied().collect();
    let set = candidates::generate(
        attendees,
        &blocked,
        GenerationParams {
            scope: settings.selection_scope,
            min_match_score: settings.min_match_score,
            weights: &settings.weights,
        },
    );

    let selected: Vec<NewSuggestion> = selection::select(set.pairs, set.pool_size)
        .into_iter()
        .map(|c| c.into_suggestion())
        .collect();

    let mut stats = summarize(&selected);
    stats.advisories = set.advisories;
    RunPlan { selected, stats }
}

fn summarize(selected: &[NewSuggestion]) -> RunStats {
    if selected.is_empty() {
        return RunStats::default();
    }

    let total: i64 = selected.iter().map(|s| i64::from(s.score)).sum();
    let avg = (total as f64 / selected.len() as f64).round() as i32;
    let touched: BTreeSet<i32> = selected
        .iter()
        .flat_map(|s| [s.pair.low(), s.pair.high()])
        .collect();

    RunStats {
        created: selected.len() as i32,
        avg_score: avg,
        attendees_matched: touched.len() as i32,
        advisories: Vec::new(),
    }
}

impl Matchmaker {
    /// Run suggestion generation for one event.
    ///
    /// Never fails: errors are logged and reported as zero stats.
    #[instrument(skip(self, cancel))]
    pub async fn generate(&self, event_id: i32, cancel: &CancellationToken) -> RunStats {
        let start = Instant::now();

        let stats = match self.try_generate(event_id, cancel).await {
            Ok(stats) => stats,
            Err(MatchingError::Cancelled) => {
                warn!(event_id, "Generation run cancelled before commit");
                return RunStats::default();
            }
            Err(e) => {
                error!(event_id, error = ?e, "Generation run failed");
                return RunStats::default();
            }
        };

        info!(
            event_id,
            created = stats.created,
            avg_score = stats.avg_score,
            attendees_matched = stats.attendees_matched,
            advisories = stats.advisories.len(),
            duration = fmt_duration(start.elapsed()),
            "Generation run committed"
        );

        self.record_last_run(event_id, &stats).await;

        if self.notify_on_generation && stats.created > 0 {
            let notification = Notification {
                event_id,
                title: "New match suggestions".to_string(),
                message: format!(
                    "{} introductions are ready for review (average score {}).",
                    stats.created, stats.avg_score
                ),
                channel: CHANNEL_IN_APP.to_string(),
                audience: AUDIENCE_ORGANIZERS.to_string(),
            };
            self.notifier.send(&notification).await;
        }

        stats
    }

    async fn try_generate(
        &self,
        event_id: i32,
        cancel: &CancellationToken,
    ) -> Result<RunStats, MatchingError> {
        let settings = self.settings(event_id).await?;

        let mut run = self.store.begin_run(event_id).await?;
        let cleared = run.clear_pending().await?;
        let attendees = run.attendees().await?;
        let existing = run.existing_pairs().await?;

        if cancel.is_cancelled() {
            return Err(MatchingError::Cancelled);
        }

        let pool = attendees.len();
        let plan = tokio::task::spawn_blocking(move || plan_run(&attendees, &existing, &settings))
            .await
            .map_err(MatchingError::Compute)?;

        if cancel.is_cancelled() {
            return Err(MatchingError::Cancelled);
        }

        let inserted = run.insert_suggestions(&plan.selected).await?;
        if inserted != plan.selected.len() as u64 {
            warn!(
                event_id,
                expected = plan.selected.len(),
                inserted,
                "Inserted suggestion count differs from selection"
            );
        }

        if cancel.is_cancelled() {
            return Err(MatchingError::Cancelled);
        }
        run.commit().await?;

        info!(event_id, pool, cleared, "Pending suggestions replaced");

        let mut stats = plan.stats;
        stats.created = inserted as i32;
        Ok(stats)
    }

    /// Persist run statistics into the event settings without touching the
    /// configurable fields. Failures only warn: the suggestions are already
    /// committed.
    async fn record_last_run(&self, event_id: i32, stats: &RunStats) {
        let last_run = LastRun {
            at: Utc::now(),
            count: stats.created,
            avg_score: stats.avg_score,
            attendees_matched: stats.attendees_matched,
        };

        if let Err(e) = self.store.save_last_run(event_id, &last_run).await {
            warn!(event_id, error = ?e, "Failed to record last run statistics");
        }
    }
}
