//! Web API module for the matchmaking console.

pub mod error;
pub mod matching;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
