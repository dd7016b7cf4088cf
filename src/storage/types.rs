use thiserror::Error;

// ============================================================================
// Database Error Types
// ============================================================================

/// Errors raised by the hub cache database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the cache database lock
    #[error("The hub cache is locked by another process")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Maps sqlx errors that indicate SQLite lock contention to [`DatabaseError::Locked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return DatabaseError::Locked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN messages.
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Cache Rows
// ============================================================================

/// A cached payload with the unix time (seconds) it was stored at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub payload: String,
    pub fetched_at: i64,
}

impl CachedPayload {
    /// Whether the row is younger than `ttl_secs` at `now`.
    pub fn is_fresh(&self, now: i64, ttl_secs: i64) -> bool {
        now.saturating_sub(self.fetched_at) < ttl_secs
    }
}
