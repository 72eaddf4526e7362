//! Candidate pair generation.
//!
//! Enumerates every unordered attendee pair of the working pool, drops pairs
//! that already have a suggestion or meeting, scores the rest, and splits them
//! into all `candidates` and the threshold-passing `pairs`.

use std::collections::HashSet;

use tracing::debug;

use super::PairKey;
use super::aggregate::{Compatibility, score_pair};
use super::profile::AttendeeProfile;
use super::settings::{CriterionWeights, SelectionScope};
use crate::data::models::{AttendeeRecord, MatchMeta, NewSuggestion};

/// A scored attendee pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePair {
    pub pair: PairKey,
    pub compatibility: Compatibility,
}

impl CandidatePair {
    pub fn score(&self) -> i32 {
        self.compatibility.score
    }

    pub fn into_suggestion(self) -> NewSuggestion {
        let c = self.compatibility;
        NewSuggestion {
            pair: self.pair,
            score: c.score,
            meta: MatchMeta {
                tags: c.tags,
                breakdown: c.breakdown,
                insights: c.insights,
                topics: c.topics,
            },
        }
    }
}

/// Inputs of a candidate generation pass.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams<'a> {
    pub scope: SelectionScope,
    pub min_match_score: i32,
    pub weights: &'a CriterionWeights,
}

/// Result of candidate generation.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Size of the working pool after scope filtering.
    pub pool_size: usize,
    /// Every scored, non-blocked, in-scope pair, in enumeration order.
    pub candidates: Vec<CandidatePair>,
    /// Pairs eligible for selection, in enumeration order.
    pub pairs: Vec<CandidatePair>,
    /// Caller-visible notes about fallbacks taken.
    pub advisories: Vec<String>,
}

/// Canonical keys of every pair that already has a suggestion or a meeting.
pub fn blocked_pairs(
    suggestions: impl IntoIterator<Item = PairKey>,
    meetings: impl IntoIterator<Item = PairKey>,
) -> HashSet<PairKey> {
    suggestions.into_iter().chain(meetings).collect()
}

/// Score threshold a candidate must reach to become a pair. Unscoreable pairs
/// are never filtered by a numeric floor.
pub fn threshold(compatibility: &Compatibility, min_match_score: i32) -> i32 {
    if compatibility.has_signal {
        min_match_score.clamp(0, 100)
    } else {
        0
    }
}

/// Generate and score candidate pairs for one event.
pub fn generate(
    attendees: &[AttendeeRecord],
    blocked: &HashSet<PairKey>,
    params: GenerationParams<'_>,
) -> CandidateSet {
    let mut advisories = Vec::new();

    let profiled: Vec<(i32, AttendeeProfile)> = attendees
        .iter()
        .map(|r| (r.id, AttendeeProfile::from_record(r)))
        .collect();

    let pool: Vec<&(i32, AttendeeProfile)> = match params.scope {
        SelectionScope::OptedIn => {
            let opted: Vec<_> = profiled.iter().filter(|(_, p)| p.opt_in).collect();
            if opted.is_empty() && !profiled.is_empty() {
                advisories.push(
                    "No attendees have opted in to matchmaking; matched across all attendees instead."
                        .to_string(),
                );
                profiled.iter().collect()
            } else {
                opted
            }
        }
        SelectionScope::All | SelectionScope::Category => profiled.iter().collect(),
    };

    let mut candidates = Vec::new();
    let mut skipped_blocked = 0usize;
    let mut skipped_scope = 0usize;

    for (i, (id_a, profile_a)) in pool.iter().map(|e| (&e.0, &e.1)).enumerate() {
        for (id_b, profile_b) in pool[i + 1..].iter().map(|e| (&e.0, &e.1)) {
            if id_a == id_b {
                continue;
            }
            let key = PairKey::new(*id_a, *id_b);
            if blocked.contains(&key) {
                skipped_blocked += 1;
                continue;
            }
            if params.scope == SelectionScope::Category
                && !same_category(&profile_a.category, &profile_b.category)
            {
                skipped_scope += 1;
                continue;
            }

            candidates.push(CandidatePair {
                pair: key,
                compatibility: score_pair(profile_a, profile_b, params.weights),
            });
        }
    }

    let mut pairs: Vec<CandidatePair> = candidates
        .iter()
        .filter(|c| c.score() >= threshold(&c.compatibility, params.min_match_score))
        .cloned()
        .collect();

    if pairs.is_empty()
        && let Some(best) = best_candidate(&candidates)
    {
        advisories.push(format!(
            "No pair reached the minimum score of {}; suggesting the best available pair ({}).",
            params.min_match_score.clamp(0, 100),
            best.score()
        ));
        pairs.push(best.clone());
    }

    debug!(
        pool_size = pool.len(),
        candidates = candidates.len(),
        pairs = pairs.len(),
        skipped_blocked,
        skipped_scope,
        "Candidate generation complete"
    );

    CandidateSet {
        pool_size: pool.len(),
        candidates,
        pairs,
        advisories,
    }
}

/// Both categories present and equal, ignoring case.
fn same_category(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && a.to_lowercase() == b.to_lowercase()
}

/// Highest-scoring candidate; the earliest enumerated wins ties.
fn best_candidate(candidates: &[CandidatePair]) -> Option<&CandidatePair> {
    candidates
        .iter()
        .fold(None, |best: Option<&CandidatePair>, c| match best {
            Some(b) if b.score() >= c.score() => Some(b),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attendee(id: i32, metadata: serde_json::Value) -> AttendeeRecord {
        AttendeeRecord {
            id,
            event_id: 1,
            name: format!("Attendee {id}"),
            company: None,
            ticket_type: None,
            metadata,
        }
    }

    fn params(scope: SelectionScope, min: i32, weights: &CriterionWeights) -> GenerationParams<'_> {
        GenerationParams {
            scope,
            min_match_score: min,
            weights,
        }
    }

    #[test]
    fn test_enumerates_every_unordered_pair() {
        let weights = CriterionWeights::default();
        let pool: Vec<_> = (1..=4).map(|id| attendee(id, json!({}))).collect();
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 0, &weights));
        assert_eq!(set.candidates.len(), 6);
        let keys: Vec<_> = set.candidates.iter().map(|c| c.pair.to_string()).collect();
        assert_eq!(keys, vec!["1:2", "1:3", "1:4", "2:3", "2:4", "3:4"]);
    }

    #[test]
    fn test_blocked_pairs_are_skipped_in_either_order() {
        let weights = CriterionWeights::default();
        let pool: Vec<_> = (1..=3).map(|id| attendee(id, json!({}))).collect();
        let blocked = blocked_pairs([PairKey::new(2, 1)], [PairKey::new(3, 2)]);
        let set = generate(&pool, &blocked, params(SelectionScope::All, 0, &weights));
        let keys: Vec<_> = set.candidates.iter().map(|c| c.pair).collect();
        assert_eq!(keys, vec![PairKey::new(1, 3)]);
    }

    #[test]
    fn test_duplicate_ids_never_pair_with_themselves() {
        let weights = CriterionWeights::default();
        let pool = vec![attendee(5, json!({})), attendee(5, json!({}))];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 0, &weights));
        assert!(set.candidates.is_empty());
        assert!(set.pairs.is_empty());
    }

    #[test]
    fn test_category_scope_requires_equal_non_empty_categories() {
        let weights = CriterionWeights::default();
        let pool = vec![
            attendee(1, json!({"category": "Startup"})),
            attendee(2, json!({"category": "startup"})),
            attendee(3, json!({"category": "Investor"})),
            attendee(4, json!({})),
        ];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::Category, 0, &weights));
        let keys: Vec<_> = set.candidates.iter().map(|c| c.pair).collect();
        assert_eq!(keys, vec![PairKey::new(1, 2)]);
        assert_eq!(set.pool_size, 4);
    }

    #[test]
    fn test_opted_in_scope_filters_pool() {
        let weights = CriterionWeights::default();
        let pool = vec![
            attendee(1, json!({"optIn": true})),
            attendee(2, json!({"optIn": false})),
            attendee(3, json!({"matchmakingOptIn": true})),
        ];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::OptedIn, 0, &weights));
        assert_eq!(set.pool_size, 2);
        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].pair, PairKey::new(1, 3));
        assert!(set.advisories.is_empty());
    }

    #[test]
    fn test_opted_in_scope_falls_back_with_advisory() {
        let weights = CriterionWeights::default();
        let pool: Vec<_> = (1..=3).map(|id| attendee(id, json!({}))).collect();
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::OptedIn, 0, &weights));
        assert_eq!(set.pool_size, 3);
        assert_eq!(set.candidates.len(), 3);
        assert_eq!(set.advisories.len(), 1);
        assert!(set.advisories[0].contains("opted in"));
    }

    #[test]
    fn test_threshold_applies_only_to_scored_pairs() {
        let weights = CriterionWeights::default();
        let pool = vec![
            // No metadata on either side: neutral 60, no signal.
            attendee(1, json!({})),
            attendee(2, json!({})),
            // Scored pair: disjoint industries -> 0.
            attendee(3, json!({"industry": "fintech"})),
            attendee(4, json!({"industry": "biotech"})),
        ];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 90, &weights));
        let keys: Vec<_> = set.pairs.iter().map(|c| c.pair).collect();
        // Only the unscoreable pairs survive a threshold of 90.
        assert!(keys.contains(&PairKey::new(1, 2)));
        assert!(!keys.contains(&PairKey::new(3, 4)));
        assert!(set.pairs.iter().all(|c| !c.compatibility.has_signal));
    }

    #[test]
    fn test_fallback_promotes_single_best_candidate() {
        let weights = CriterionWeights::default();
        let pool = vec![
            attendee(1, json!({"title": "CTO", "industries": ["fintech", "ai"]})),
            attendee(2, json!({"title": "Founder", "industries": ["fintech"]})),
        ];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 75, &weights));
        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.pairs.len(), 1);
        assert_eq!(set.pairs[0].score(), 55);
        assert_eq!(set.advisories.len(), 1);
    }

    #[test]
    fn test_fallback_prefers_earliest_on_ties() {
        let weights = CriterionWeights::default();
        let pool = vec![
            attendee(1, json!({"industry": "a"})),
            attendee(2, json!({"industry": "b"})),
            attendee(3, json!({"industry": "c"})),
        ];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 100, &weights));
        assert_eq!(set.pairs.len(), 1);
        assert_eq!(set.pairs[0].pair, PairKey::new(1, 2));
    }

    #[test]
    fn test_no_candidates_no_fallback() {
        let weights = CriterionWeights::default();
        let pool = vec![attendee(1, json!({}))];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 50, &weights));
        assert!(set.pairs.is_empty());
        assert!(set.advisories.is_empty());
    }

    #[test]
    fn test_into_suggestion_carries_meta() {
        let weights = CriterionWeights::default();
        let pool = vec![
            attendee(1, json!({"goals": "Fundraising, Hiring"})),
            attendee(2, json!({"goals": "hiring"})),
        ];
        let set = generate(&pool, &HashSet::new(), params(SelectionScope::All, 0, &weights));
        let suggestion = set.pairs[0].clone().into_suggestion();
        assert_eq!(suggestion.pair, PairKey::new(1, 2));
        assert_eq!(suggestion.meta.topics, vec!["Hiring"]);
        assert_eq!(suggestion.meta.breakdown.len(), 5);
    }
}
