//! Per-event matching configuration: weights, threshold, scope and last-run stats.
//!
//! Stored as a JSON document. Older documents name the role weight
//! `jobRoleCompatibility`; it is still accepted, but the canonical `role` key
//! wins when both are present.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Default weight for every criterion.
pub const DEFAULT_WEIGHT: i32 = 100;

/// Default minimum compatibility score for a scored pair to be suggested.
pub const DEFAULT_MIN_MATCH_SCORE: i32 = 50;

/// Which attendees take part in a generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum SelectionScope {
    /// Every attendee of the event.
    #[default]
    All,
    /// Only pairs whose attendees share the same category.
    Category,
    /// Only attendees who opted in to matchmaking.
    OptedIn,
}

impl SelectionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Category => "category",
            Self::OptedIn => "optedIn",
        }
    }
}

/// Relative weight (0-100) of each criterion in the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CriterionWeights {
    pub industry: i32,
    pub role: i32,
    pub stage: i32,
    pub goals: i32,
    pub interests: i32,
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            industry: DEFAULT_WEIGHT,
            role: DEFAULT_WEIGHT,
            stage: DEFAULT_WEIGHT,
            goals: DEFAULT_WEIGHT,
            interests: DEFAULT_WEIGHT,
        }
    }
}

impl CriterionWeights {
    /// Copy with every weight clamped into 0-100.
    pub fn clamped(&self) -> Self {
        Self {
            industry: self.industry.clamp(0, 100),
            role: self.role.clamp(0, 100),
            stage: self.stage.clamp(0, 100),
            goals: self.goals.clamp(0, 100),
            interests: self.interests.clamp(0, 100),
        }
    }
}

/// Statistics of the most recent successful generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LastRun {
    pub at: DateTime<Utc>,
    pub count: i32,
    pub avg_score: i32,
    pub attendees_matched: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MatchingSettings {
    pub selection_scope: SelectionScope,
    pub weights: CriterionWeights,
    pub min_match_score: i32,
    pub last_run: Option<LastRun>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            selection_scope: SelectionScope::All,
            weights: CriterionWeights::default(),
            min_match_score: DEFAULT_MIN_MATCH_SCORE,
            last_run: None,
        }
    }
}

/// Weights as they may appear in a stored document. Numbers may be floats and
/// any key may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWeights {
    industry: Option<f64>,
    role: Option<f64>,
    /// Legacy name for `role`.
    job_role_compatibility: Option<f64>,
    stage: Option<f64>,
    goals: Option<f64>,
    interests: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    selection_scope: Option<SelectionScope>,
    #[serde(default)]
    weights: StoredWeights,
    min_match_score: Option<f64>,
    last_run: Option<LastRun>,
}

fn weight_or_default(value: Option<f64>) -> i32 {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as i32)
        .unwrap_or(DEFAULT_WEIGHT)
}

impl MatchingSettings {
    /// Parse a stored settings document, filling defaults for anything missing.
    ///
    /// Errors carry the JSON path of the offending field.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let stored: StoredSettings = serde_path_to_error::deserialize(value).map_err(|err| {
            anyhow::anyhow!("invalid matching settings at '{}': {}", err.path(), err.inner())
        })?;

        let w = stored.weights;
        let weights = CriterionWeights {
            industry: weight_or_default(w.industry),
            role: weight_or_default(w.role.or(w.job_role_compatibility)),
            stage: weight_or_default(w.stage),
            goals: weight_or_default(w.goals),
            interests: weight_or_default(w.interests),
        };

        let min_match_score = stored
            .min_match_score
            .filter(|v| v.is_finite())
            .map(|v| v.round().clamp(0.0, 100.0) as i32)
            .unwrap_or(DEFAULT_MIN_MATCH_SCORE);

        Ok(Self {
            selection_scope: stored.selection_scope.unwrap_or_default(),
            weights,
            min_match_score,
            last_run: stored.last_run,
        })
    }

    /// Serialize into the stored document form.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Apply an update from the settings API. Weights and threshold are clamped;
    /// `last_run` is never overwritten from outside.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(scope) = update.selection_scope {
            self.selection_scope = scope;
        }
        if let Some(weights) = update.weights {
            self.weights = weights.clamped();
        }
        if let Some(min) = update.min_match_score {
            self.min_match_score = min.clamp(0, 100);
        }
    }
}

/// Partial settings update accepted by the API.
#[derive(Debug, Clone, Default, Deserialize, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_scope: Option<SelectionScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<CriterionWeights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_match_score: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = MatchingSettings::from_json(&json!({})).unwrap();
        assert_eq!(settings, MatchingSettings::default());
    }

    #[test]
    fn test_legacy_role_alias() {
        let settings =
            MatchingSettings::from_json(&json!({"weights": {"jobRoleCompatibility": 40}})).unwrap();
        assert_eq!(settings.weights.role, 40);
    }

    #[test]
    fn test_canonical_role_key_wins() {
        let settings = MatchingSettings::from_json(&json!({
            "weights": {"jobRoleCompatibility": 40, "role": 70}
        }))
        .unwrap();
        assert_eq!(settings.weights.role, 70);
    }

    #[test]
    fn test_values_are_rounded_and_clamped() {
        let settings = MatchingSettings::from_json(&json!({
            "selectionScope": "optedIn",
            "weights": {"industry": 250, "goals": -5, "stage": 33.6},
            "minMatchScore": 140
        }))
        .unwrap();
        assert_eq!(settings.selection_scope, SelectionScope::OptedIn);
        assert_eq!(settings.weights.industry, 100);
        assert_eq!(settings.weights.goals, 0);
        assert_eq!(settings.weights.stage, 34);
        assert_eq!(settings.min_match_score, 100);
    }

    #[test]
    fn test_invalid_scope_reports_path() {
        let err = MatchingSettings::from_json(&json!({"selectionScope": "everyone"})).unwrap_err();
        assert!(err.to_string().contains("selectionScope"), "got: {err}");
    }

    #[test]
    fn test_round_trip_through_stored_form() {
        let mut settings = MatchingSettings::default();
        settings.selection_scope = SelectionScope::Category;
        settings.weights.role = 20;
        settings.last_run = Some(LastRun {
            at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            count: 12,
            avg_score: 71,
            attendees_matched: 15,
        });
        let parsed = MatchingSettings::from_json(&settings.to_json()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_apply_update_clamps() {
        let mut settings = MatchingSettings::default();
        settings.apply(SettingsUpdate {
            selection_scope: Some(SelectionScope::Category),
            weights: Some(CriterionWeights {
                industry: 120,
                role: 50,
                stage: -1,
                goals: 100,
                interests: 0,
            }),
            min_match_score: Some(-20),
        });
        assert_eq!(settings.selection_scope, SelectionScope::Category);
        assert_eq!(settings.weights.industry, 100);
        assert_eq!(settings.weights.stage, 0);
        assert_eq!(settings.min_match_score, 0);
    }
}
