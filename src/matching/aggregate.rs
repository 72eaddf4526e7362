//! Weighted aggregation of criterion scores into one compatibility score.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::criteria::{CriterionResult, overlap_score, role_score, stage_score};
use super::profile::{AttendeeProfile, token_key};
use super::settings::CriterionWeights;

/// Score given to a pair when no criterion produced a signal.
pub const NEUTRAL_SCORE: i32 = 60;

/// Shared tokens contributed to `topics` per overlap criterion.
const TOPICS_PER_CRITERION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionKey {
    Industry,
    Role,
    Stage,
    Goals,
    Interests,
}

impl CriterionKey {
    pub const ALL: [CriterionKey; 5] = [
        Self::Industry,
        Self::Role,
        Self::Stage,
        Self::Goals,
        Self::Interests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Industry => "industry",
            Self::Role => "role",
            Self::Stage => "stage",
            Self::Goals => "goals",
            Self::Interests => "interests",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Industry => "Industry",
            Self::Role => "Role",
            Self::Stage => "Stage",
            Self::Goals => "Goals",
            Self::Interests => "Interests",
        }
    }

    fn weight(&self, weights: &CriterionWeights) -> i32 {
        match self {
            Self::Industry => weights.industry,
            Self::Role => weights.role,
            Self::Stage => weights.stage,
            Self::Goals => weights.goals,
            Self::Interests => weights.interests,
        }
    }

    fn evaluate(&self, a: &AttendeeProfile, b: &AttendeeProfile) -> CriterionResult {
        match self {
            Self::Industry => overlap_score(&a.industries, &b.industries),
            Self::Role => role_score(a, b),
            Self::Stage => stage_score(a, b),
            Self::Goals => overlap_score(&a.goals, &b.goals),
            Self::Interests => overlap_score(&a.interests, &b.interests),
        }
    }

    /// Tag separator for the evidence list of this criterion.
    fn joiner(&self) -> &'static str {
        match self {
            Self::Role => " + ",
            Self::Stage => " / ",
            _ => ", ",
        }
    }

    fn insight(&self, common: &[String]) -> String {
        let list = common.join(", ");
        match self {
            Self::Industry => format!("Both work in {list}."),
            Self::Role if common.len() == 1 => format!("Both hold {list} roles."),
            Self::Role => format!("Complementary roles: {}.", common.join(" and ")),
            Self::Stage if common.len() == 1 => {
                format!("Their companies are at the same stage ({list}).")
            }
            Self::Stage => format!(
                "Their companies are at neighbouring stages ({}).",
                common.join(" and ")
            ),
            Self::Goals => format!("Shared goals: {list}."),
            Self::Interests => format!("Common interests: {list}."),
        }
    }
}

/// One criterion as shown in a score breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Criterion {
    pub key: String,
    pub label: String,
    pub weight: i32,
    /// 0 when the criterion had no signal; see `has_signal`.
    pub score: i32,
    pub has_signal: bool,
    pub detail: String,
}

/// Aggregated compatibility for one attendee pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    pub score: i32,
    pub has_signal: bool,
    pub tags: Vec<String>,
    pub insights: Vec<String>,
    pub topics: Vec<String>,
    pub breakdown: Vec<Criterion>,
}

/// Score two profiles against each other with the given weights.
pub fn score_pair(
    a: &AttendeeProfile,
    b: &AttendeeProfile,
    weights: &CriterionWeights,
) -> Compatibility {
    let weights = weights.clamped();

    let mut weighted_sum = 0i64;
    let mut weight_total = 0i64;
    let mut tags = Vec::new();
    let mut insights = Vec::new();
    let mut topics: Vec<String> = Vec::new();
    let mut breakdown = Vec::with_capacity(CriterionKey::ALL.len());

    for key in CriterionKey::ALL {
        let weight = key.weight(&weights);
        let result = key.evaluate(a, b);

        if let Some(score) = result.score {
            weighted_sum += i64::from(score) * i64::from(weight);
            weight_total += i64::from(weight);
        }

        if !result.common.is_empty() {
            tags.push(format!("{}: {}", key.label(), result.common.join(key.joiner())));
            insights.push(key.insight(&result.common));
        }

        if matches!(key, CriterionKey::Goals | CriterionKey::Interests) {
            for token in result.common.iter().take(TOPICS_PER_CRITERION) {
                let key = token_key(token);
                if !topics.iter().any(|t| token_key(t) == key) {
                    topics.push(token.clone());
                }
            }
        }

        breakdown.push(Criterion {
            key: key.as_str().to_string(),
            label: key.label().to_string(),
            weight,
            score: result.score.unwrap_or(0),
            has_signal: result.score.is_some(),
            detail: result.detail,
        });
    }

    let (score, has_signal) = if weight_total > 0 {
        let avg = weighted_sum as f64 / weight_total as f64;
        (avg.round() as i32, true)
    } else {
        (NEUTRAL_SCORE, false)
    };

    Compatibility {
        score: score.clamp(0, 100),
        has_signal,
        tags,
        insights,
        topics,
        breakdown,
    }
}
