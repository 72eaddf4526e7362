//! Greedy, quota-constrained selection of suggestion pairs.

use std::collections::HashMap;

use super::candidates::CandidatePair;

const MIN_SUGGESTIONS: i64 = 10;
const MAX_SUGGESTIONS: i64 = 200;
const MIN_PER_ATTENDEE: i64 = 3;

/// Run-wide caps derived from the working pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    pub max_suggestions: usize,
    pub per_attendee: usize,
}

impl SelectionLimits {
    /// `None` for pools too small to pair anyone.
    pub fn for_pool(n: usize) -> Option<Self> {
        if n < 2 {
            return None;
        }
        let n_f = n as f64;
        let max = ((n_f * 0.4).round() as i64).clamp(MIN_SUGGESTIONS, MAX_SUGGESTIONS);
        let per = ((max as f64 / n_f * 6.0).round() as i64).max(MIN_PER_ATTENDEE);
        Some(Self {
            max_suggestions: max as usize,
            per_attendee: per as usize,
        })
    }
}

/// Pick pairs highest score first, skipping any pair whose attendee already
/// hit the per-attendee limit. Equal scores keep their enumeration order.
pub fn select(mut pairs: Vec<CandidatePair>, pool_size: usize) -> Vec<CandidatePair> {
    let Some(limits) = SelectionLimits::for_pool(pool_size) else {
        return Vec::new();
    };

    // `sort_by` is stable, which is what keeps ties in enumeration order.
    pairs.sort_by(|a, b| b.score().cmp(&a.score()));

    let mut counts: HashMap<i32, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(limits.max_suggestions.min(pairs.len()));

    for candidate in pairs {
        if selected.len() >= limits.max_suggestions {
            break;
        }
        let (a, b) = (candidate.pair.low(), candidate.pair.high());
        let full = |id: i32| counts.get(&id).copied().unwrap_or(0) >= limits.per_attendee;
        if full(a) || full(b) {
            continue;
        }
        *counts.entry(a).or_default() += 1;
        *counts.entry(b).or_default() += 1;
        selected.push(candidate);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::PairKey;
    use crate::matching::aggregate::Compatibility;

    fn candidate(a: i32, b: i32, score: i32) -> CandidatePair {
        CandidatePair {
            pair: PairKey::new(a, b),
            compatibility: Compatibility {
                score,
                has_signal: true,
                tags: vec![],
                insights: vec![],
                topics: vec![],
                breakdown: vec![],
            },
        }
    }

    /// Every unordered pair of `1..=n`, all with the same score.
    fn complete_graph(n: i32, score: i32) -> Vec<CandidatePair> {
        let mut out = Vec::new();
        for a in 1..=n {
            for b in (a + 1)..=n {
                out.push(candidate(a, b, score));
            }
        }
        out
    }

    #[test]
    fn test_limits_for_pool_of_ten() {
        let limits = SelectionLimits::for_pool(10).unwrap();
        assert_eq!(limits.max_suggestions, 10);
        assert_eq!(limits.per_attendee, 6);
    }

    #[test]
    fn test_limits_scale_and_cap() {
        // 100 attendees: round(40) = 40, per = max(3, round(40/100*6)) = 3
        let limits = SelectionLimits::for_pool(100).unwrap();
        assert_eq!(limits.max_suggestions, 40);
        assert_eq!(limits.per_attendee, 3);

        let limits = SelectionLimits::for_pool(1000).unwrap();
        assert_eq!(limits.max_suggestions, 200);
        assert_eq!(limits.per_attendee, 3);

        // Tiny pools get the floor of 10 and a generous quota: round(10/2*6) = 30
        let limits = SelectionLimits::for_pool(2).unwrap();
        assert_eq!(limits.max_suggestions, 10);
        assert_eq!(limits.per_attendee, 30);
    }

    #[test]
    fn test_too_small_pool_selects_nothing() {
        assert_eq!(SelectionLimits::for_pool(0), None);
        assert_eq!(SelectionLimits::for_pool(1), None);
        assert!(select(vec![candidate(1, 2, 90)], 1).is_empty());
    }

    #[test]
    fn test_orders_by_score_descending() {
        let pairs = vec![candidate(1, 2, 40), candidate(3, 4, 90), candidate(5, 6, 70)];
        let selected = select(pairs, 6);
        let scores: Vec<_> = selected.iter().map(|c| c.score()).collect();
        assert_eq!(scores, vec![90, 70, 40]);
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let pairs = vec![candidate(1, 2, 80), candidate(1, 3, 80), candidate(2, 3, 80)];
        let selected = select(pairs, 3);
        let keys: Vec<_> = selected.iter().map(|c| c.pair.to_string()).collect();
        assert_eq!(keys, vec!["1:2", "1:3", "2:3"]);
    }

    #[test]
    fn test_global_cap() {
        // 20 attendees -> max 10 suggestions, per-attendee limit 3.
        let selected = select(complete_graph(20, 70), 20);
        assert_eq!(selected.len(), 10);
    }

    #[test]
    fn test_quota_is_never_exceeded() {
        // 40 attendees: max 16, per-attendee max(3, round(16/40*6)) = 3
        let selected = select(complete_graph(40, 50), 40);
        let mut counts: HashMap<i32, usize> = HashMap::new();
        for c in &selected {
            *counts.entry(c.pair.low()).or_default() += 1;
            *counts.entry(c.pair.high()).or_default() += 1;
        }
        assert!(counts.values().all(|&n| n <= 3), "counts: {counts:?}");
        assert_eq!(selected.len(), 16);
    }

    #[test]
    fn test_saturated_attendee_is_skipped_for_lower_pairs() {
        // 12 attendees: max 10, per-attendee round(10/12*6) = 5. Attendee 1
        // is in six top pairs, so the sixth is dropped.
        let mut pairs: Vec<_> = (2..=7).map(|b| candidate(1, b, 95)).collect();
        pairs.push(candidate(8, 9, 10));
        let selected = select(pairs, 12);
        let with_one = selected.iter().filter(|c| c.pair.contains(1)).count();
        assert_eq!(with_one, 5);
        assert!(selected.iter().any(|c| c.pair == PairKey::new(8, 9)));
    }
}
