//! B2B matchmaking engine.
//!
//! Pipeline: attendee records -> [`profile`] -> pairwise [`criteria`] ->
//! [`aggregate`] score -> [`candidates`] (blocked pairs, scope, threshold) ->
//! [`selection`] (global cap and per-attendee quota).
//!
//! Everything in this module is pure and synchronous; I/O lives in
//! [`crate::data`] and orchestration in [`crate::services`].

pub mod aggregate;
pub mod candidates;
pub mod criteria;
pub mod profile;
pub mod selection;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order-independent identity of an attendee pair: the smaller ID first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(i32, i32);

impl PairKey {
    pub fn new(a: i32, b: i32) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn low(&self) -> i32 {
        self.0
    }

    pub fn high(&self) -> i32 {
        self.1
    }

    pub fn contains(&self, attendee_id: i32) -> bool {
        self.0 == attendee_id || self.1 == attendee_id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}
