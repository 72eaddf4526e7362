//! Attendee profile extraction from free-form registration metadata.
//!
//! Registration forms evolved over several events, so the same concept shows
//! up under different keys (`industry` vs `sectors`, `goals` vs `objectives`).
//! Every field is resolved through an explicit, ordered fallback chain here so
//! the scorers only ever see typed, normalized values.

use indexmap::IndexMap;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::data::models::AttendeeRecord;

const TITLE_KEYS: &[&str] = &["title", "jobTitle", "role"];
const INDUSTRY_KEYS: &[&str] = &["industry", "industries", "sector", "sectors"];
const INTEREST_KEYS: &[&str] = &["interests", "topics"];
const GOAL_KEYS: &[&str] = &["goals", "objectives"];
const STAGE_KEYS: &[&str] = &["companyStage", "stage"];
const CATEGORY_KEYS: &[&str] = &["category"];
const OPT_IN_KEYS: &[&str] = &["matchmakingOptIn", "optIn", "openToMeet", "shortlist"];

/// Characters that separate tokens inside a single free-text field.
const TOKEN_DELIMITERS: &[char] = &[',', ';', '|', '/'];

/// An insertion-ordered set of tokens, deduplicated case-insensitively.
///
/// Keys are NFKC-normalized and lowercased; values keep the casing of the
/// first occurrence for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: IndexMap<String, String>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw token. Blank tokens are ignored; duplicates keep the first casing.
    pub fn insert(&mut self, raw: &str) {
        let display = raw.trim();
        if display.is_empty() {
            return;
        }
        self.tokens
            .entry(token_key(display))
            .or_insert_with(|| display.to_string());
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tokens.contains_key(key)
    }

    /// Display form stored for a comparison key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens.get(key).map(String::as_str)
    }

    /// Iterate `(comparison key, display form)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Display forms in first-seen order.
    pub fn display(&self) -> Vec<String> {
        self.tokens.values().cloned().collect()
    }
}

impl<'a> FromIterator<&'a str> for TokenSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

/// Comparison key for a token: NFKC + lowercase + trimmed.
pub fn token_key(token: &str) -> String {
    token.trim().nfkc().collect::<String>().to_lowercase()
}

/// Normalize a metadata value into tokens.
///
/// Strings are split on `,` `;` `|` `/`. Lists are flattened one element at a
/// time with the same rules. Numbers become their decimal text. Anything else
/// (null, booleans, objects) contributes nothing.
pub fn normalize_tokens(value: &Value) -> TokenSet {
    let mut set = TokenSet::new();
    collect_tokens(value, &mut set);
    set
}

fn collect_tokens(value: &Value, set: &mut TokenSet) {
    match value {
        Value::String(s) => {
            for part in s.split(TOKEN_DELIMITERS) {
                set.insert(part);
            }
        }
        Value::Number(n) => set.insert(&n.to_string()),
        Value::Array(items) => {
            for item in items {
                collect_tokens(item, set);
            }
        }
        Value::Null | Value::Bool(_) | Value::Object(_) => {}
    }
}

/// A company stage placed on the canonical funding ladder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    pub label: String,
    /// 1 (pre-seed) through 7 (enterprise); `None` when no stage was given.
    pub rank: Option<u8>,
}

/// Rank given to stage text that does not match any rung of the ladder.
const UNKNOWN_STAGE_RANK: u8 = 4;

/// Ladder rungs in matching priority order. Order matters: "pre-seed" contains
/// "seed", so the pre-seed patterns must be tested first.
const STAGE_LADDER: &[(&[&str], &str, u8)] = &[
    (&["pre-seed", "preseed", "pre seed"], "Pre-seed", 1),
    (&["seed"], "Seed", 2),
    (&["series a"], "Series A", 3),
    (&["series b"], "Series B", 4),
    (&["series c", "series d", "series e"], "Series C", 5),
    (&["growth", "scale-up", "scaleup"], "Growth", 6),
    (&["enterprise", "public", "corporate"], "Enterprise", 7),
];

/// Map free-form stage text to the canonical ladder.
pub fn normalize_stage(raw: &str) -> Stage {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Stage::default();
    }

    let lower = trimmed.to_lowercase();
    for &(patterns, label, rank) in STAGE_LADDER {
        if patterns.iter().any(|p| lower.contains(p)) {
            return Stage {
                label: label.to_string(),
                rank: Some(rank),
            };
        }
    }

    Stage {
        label: trimmed.to_string(),
        rank: Some(UNKNOWN_STAGE_RANK),
    }
}

/// Coarse functional role derived from a job title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleCategory {
    Tech,
    Product,
    Sales,
    Marketing,
    Leadership,
    Investor,
    Ops,
    Other,
}

impl RoleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tech => "tech",
            Self::Product => "product",
            Self::Sales => "sales",
            Self::Marketing => "marketing",
            Self::Leadership => "leadership",
            Self::Investor => "investor",
            Self::Ops => "ops",
            Self::Other => "other",
        }
    }
}

/// Keyword table for role categorization; the first category with a matching
/// keyword wins. Keywords match whole words (or whole word sequences) only, so
/// "cto" does not fire inside "director".
const ROLE_KEYWORDS: &[(RoleCategory, &[&str])] = &[
    (
        RoleCategory::Investor,
        &[
            "investor",
            "vc",
            "venture",
            "angel",
            "fund",
            "capital",
            "general partner",
            "limited partner",
        ],
    ),
    (
        RoleCategory::Leadership,
        &[
            "ceo",
            "founder",
            "co-founder",
            "cofounder",
            "president",
            "owner",
            "chief executive",
            "managing director",
            "executive director",
        ],
    ),
    (
        RoleCategory::Tech,
        &[
            "cto",
            "engineer",
            "engineering",
            "developer",
            "architect",
            "software",
            "data scientist",
            "devops",
            "technical",
            "technology",
            "it",
        ],
    ),
    (
        RoleCategory::Product,
        &["product", "pm", "cpo", "designer", "design", "ux", "ui"],
    ),
    (
        RoleCategory::Sales,
        &[
            "sales",
            "account executive",
            "account manager",
            "business development",
            "bd",
            "bdr",
            "sdr",
            "partnerships",
        ],
    ),
    (
        RoleCategory::Marketing,
        &[
            "marketing",
            "cmo",
            "brand",
            "content",
            "communications",
            "pr",
            "community",
        ],
    ),
    (
        RoleCategory::Ops,
        &[
            "operations",
            "ops",
            "coo",
            "cfo",
            "finance",
            "hr",
            "people",
            "legal",
            "procurement",
        ],
    ),
];

/// Categorize a job title. Returns `None` for a blank title.
pub fn categorize_role(title: &str) -> Option<RoleCategory> {
    let words: Vec<String> = title
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() {
        return None;
    }

    // Pad with spaces so keyword phrases only match on word boundaries.
    let haystack = format!(" {} ", words.join(" "));
    for &(category, keywords) in ROLE_KEYWORDS {
        if keywords
            .iter()
            .any(|kw| haystack.contains(&format!(" {kw} ")))
        {
            return Some(category);
        }
    }

    Some(RoleCategory::Other)
}

/// Normalized view of one attendee, ready for scoring.
#[derive(Debug, Clone, Default)]
pub struct AttendeeProfile {
    pub title: String,
    pub role: Option<RoleCategory>,
    pub industries: TokenSet,
    pub interests: TokenSet,
    pub goals: TokenSet,
    pub stage: Stage,
    pub category: String,
    pub opt_in: bool,
}

impl AttendeeProfile {
    /// Build a profile from a raw attendee record.
    pub fn from_record(record: &AttendeeRecord) -> Self {
        let meta = &record.metadata;
        let title = first_text(meta, TITLE_KEYS);
        let stage_text = first_text(meta, STAGE_KEYS);

        Self {
            role: categorize_role(&title),
            title,
            industries: first_tokens(meta, INDUSTRY_KEYS),
            interests: first_tokens(meta, INTEREST_KEYS),
            goals: first_tokens(meta, GOAL_KEYS),
            stage: normalize_stage(&stage_text),
            category: first_text(meta, CATEGORY_KEYS),
            opt_in: resolve_opt_in(meta),
        }
    }
}

/// First key in `keys` that holds a non-blank string (or a number), trimmed.
fn first_text(meta: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| match meta.get(key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// First key in `keys` whose value normalizes to a non-empty token set.
fn first_tokens(meta: &Value, keys: &[&str]) -> TokenSet {
    keys.iter()
        .filter_map(|key| meta.get(key))
        .map(normalize_tokens)
        .find(|set| !set.is_empty())
        .unwrap_or_default()
}

/// Opt-in is only true for an explicit boolean `true` on the first key present.
fn resolve_opt_in(meta: &Value) -> bool {
    OPT_IN_KEYS
        .iter()
        .find_map(|key| meta.get(key).filter(|v| !v.is_null()))
        .is_some_and(|v| v.as_bool() == Some(true))
}
