//! The domain model of catalog search
pub mod query;
pub mod search_state;
pub mod snapshot;
