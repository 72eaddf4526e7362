//! Database models and storage.

pub mod models;
pub mod postgres;
pub mod store;

pub use postgres::PgMatchStore;
pub use store::{MatchStore, RunTransaction, StoreError, StoreResult};
