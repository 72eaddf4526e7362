//! Application state shared across request handlers.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::services::Matchmaker;

#[derive(Clone)]
pub struct AppState {
    pub matchmaker: Matchmaker,
    /// Cancelled when the server starts shutting down; generation runs check it
    /// before writing.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(matchmaker: Matchmaker, shutdown: CancellationToken) -> Self {
        Self {
            matchmaker,
            shutdown,
            started_at: Instant::now(),
        }
    }
}
