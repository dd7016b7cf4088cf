//! SQLite persistence for the widget's hub cache.
mod hub_cache;
mod schema;
mod types;

pub use schema::Database;
pub use types::{CachedPayload, DatabaseError};
