//! Matching operations: generation runs, scheduling and suggestion review.
//!
//! [`Matchmaker`] wires the pure engine in [`crate::matching`] to a
//! [`MatchStore`] and a [`Notifier`]. Each public method is one logical
//! operation; the web layer only translates HTTP to these calls.

pub mod generation;
pub mod notify;
pub mod scheduler;
pub mod suggestions;

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::data::store::{MatchStore, StoreError};
use crate::matching::settings::{MatchingSettings, SettingsUpdate};
use notify::Notifier;

pub use generation::RunStats;
pub use scheduler::{ScheduleRequest, ScheduledMeeting};
pub use suggestions::PairExplanation;

#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("failed to load matching data")]
    DataFetch(#[source] StoreError),
    #[error("{0}")]
    Validation(String),
    #[error("failed to persist matching results")]
    Persistence(#[source] StoreError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("matching computation failed")]
    Compute(#[source] tokio::task::JoinError),
    #[error("operation cancelled")]
    Cancelled,
}

impl From<StoreError> for MatchingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Fetch { .. } => Self::DataFetch(err),
            StoreError::Write { .. } => Self::Persistence(err),
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

#[derive(Clone)]
pub struct Matchmaker {
    store: Arc<dyn MatchStore>,
    notifier: Arc<dyn Notifier>,
    notify_on_generation: bool,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn MatchStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            notify_on_generation: false,
        }
    }

    /// Also notify organizers after every generation run that created suggestions.
    pub fn with_generation_notices(mut self, enabled: bool) -> Self {
        self.notify_on_generation = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Current settings of an event; defaults when none were ever saved.
    pub async fn settings(&self, event_id: i32) -> Result<MatchingSettings, MatchingError> {
        let Some(document) = self.store.load_settings(event_id).await? else {
            debug!(event_id, "No stored matching settings, using defaults");
            return Ok(MatchingSettings::default());
        };

        MatchingSettings::from_json(&document).map_err(|source| {
            MatchingError::DataFetch(StoreError::Fetch {
                what: "matching settings",
                source,
            })
        })
    }

    #[instrument(skip(self, update))]
    pub async fn update_settings(
        &self,
        event_id: i32,
        update: SettingsUpdate,
    ) -> Result<MatchingSettings, MatchingError> {
        let mut settings = self.settings(event_id).await?;
        settings.apply(update);
        self.store.save_settings(event_id, &settings).await?;
        debug!(
            event_id,
            scope = settings.selection_scope.as_str(),
            min_match_score = settings.min_match_score,
            "Matching settings updated"
        );
        Ok(settings)
    }
}
