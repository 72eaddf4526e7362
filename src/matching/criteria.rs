//! Pairwise criterion scorers.
//!
//! Each scorer is a pure, symmetric function over two profiles. A `None` score
//! means "no signal": at least one side lacks the data needed to compare, and
//! the aggregator leaves the criterion out of the weighted average entirely.

use super::profile::{AttendeeProfile, RoleCategory, TokenSet};

/// Output of a single criterion comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriterionResult {
    pub score: Option<i32>,
    pub detail: String,
    /// Evidence the pair shares. Overlap criteria list shared tokens sorted
    /// case-insensitively; role and stage list the matching categories or
    /// stage labels when the pairing is a strong one, and nothing otherwise.
    pub common: Vec<String>,
}

impl CriterionResult {
    fn no_signal(detail: impl Into<String>) -> Self {
        Self {
            score: None,
            detail: detail.into(),
            common: Vec::new(),
        }
    }
}

const SAME_ROLE_SCORE: i32 = 90;
const GENERIC_ROLE_SCORE: i32 = 60;

/// Role pairings that score above the generic "complementary roles" value.
/// Looked up in both directions.
const SPECIAL_ROLE_PAIRS: &[(RoleCategory, RoleCategory, i32, &str)] = &[
    (
        RoleCategory::Investor,
        RoleCategory::Leadership,
        95,
        "investor meets company leadership",
    ),
    (
        RoleCategory::Product,
        RoleCategory::Tech,
        85,
        "product and engineering counterparts",
    ),
    (
        RoleCategory::Sales,
        RoleCategory::Marketing,
        82,
        "go-to-market counterparts",
    ),
];

/// Points lost per rung of distance on the stage ladder.
const STAGE_STEP_PENALTY: i32 = 15;

/// Jaccard overlap of two token sets, scaled to 0-100.
pub fn overlap_score(a: &TokenSet, b: &TokenSet) -> CriterionResult {
    if a.is_empty() || b.is_empty() {
        return CriterionResult::no_signal("Not enough data to compare");
    }

    // Either side may spell a shared token differently; the smaller display
    // form is used so the evidence reads the same from both sides.
    let mut common: Vec<(&str, &str)> = a
        .iter()
        .filter_map(|(key, shown_a)| b.get(key).map(|shown_b| (key, shown_a.min(shown_b))))
        .collect();
    common.sort_by(|x, y| x.0.cmp(y.0));

    let intersection = common.len();
    let union = a.len() + b.len() - intersection;
    let score = ((intersection as f64 / union as f64) * 100.0).round() as i32;

    CriterionResult {
        score: Some(score),
        detail: format!("{intersection} of {union} shared ({score}%)"),
        common: common.into_iter().map(|(_, display)| display.to_string()).collect(),
    }
}

/// Role compatibility from the two derived role categories.
pub fn role_score(a: &AttendeeProfile, b: &AttendeeProfile) -> CriterionResult {
    let (Some(ra), Some(rb)) = (a.role, b.role) else {
        return CriterionResult::no_signal("Job title missing");
    };

    if ra == rb {
        return CriterionResult {
            score: Some(SAME_ROLE_SCORE),
            detail: format!("Both in {}", ra.as_str()),
            common: vec![ra.as_str().to_string()],
        };
    }

    let special = SPECIAL_ROLE_PAIRS
        .iter()
        .find(|(x, y, _, _)| (*x == ra && *y == rb) || (*x == rb && *y == ra));

    // Order the categories so the output is the same from either side.
    let (first, second) = if ra.as_str() <= rb.as_str() {
        (ra.as_str(), rb.as_str())
    } else {
        (rb.as_str(), ra.as_str())
    };

    match special {
        Some(&(_, _, score, why)) => CriterionResult {
            score: Some(score),
            detail: format!("{first} + {second}: {why}"),
            common: vec![first.to_string(), second.to_string()],
        },
        None => CriterionResult {
            score: Some(GENERIC_ROLE_SCORE),
            detail: format!("{first} + {second}: complementary roles"),
            common: Vec::new(),
        },
    }
}

/// Stage proximity on the funding ladder.
pub fn stage_score(a: &AttendeeProfile, b: &AttendeeProfile) -> CriterionResult {
    let (Some(ra), Some(rb)) = (a.stage.rank, b.stage.rank) else {
        return CriterionResult::no_signal("Company stage missing");
    };

    let distance = (i32::from(ra) - i32::from(rb)).abs();
    let score = (100 - STAGE_STEP_PENALTY * distance).max(0);

    // Unrecognized stage text shares rank 4 with Series B, so equal ranks can
    // still carry different labels. Order by (rank, label) to stay symmetric.
    let (low, high) = if (ra, &a.stage.label) <= (rb, &b.stage.label) {
        (&a.stage.label, &b.stage.label)
    } else {
        (&b.stage.label, &a.stage.label)
    };

    if distance == 0 {
        let common = if low == high {
            vec![low.clone()]
        } else {
            vec![low.clone(), high.clone()]
        };
        return CriterionResult {
            score: Some(score),
            detail: format!("Same stage ({})", common.join(" / ")),
            common,
        };
    }

    // Neighbouring rungs still count as evidence; anything further apart does not.
    let common = if distance == 1 {
        vec![low.clone(), high.clone()]
    } else {
        Vec::new()
    };

    CriterionResult {
        score: Some(score),
        detail: format!("{low} vs {high} ({distance} apart)"),
        common,
    }
}
