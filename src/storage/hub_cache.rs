use super::schema::Database;
use super::types::{CachedPayload, DatabaseError};

impl Database {
    // ========================================================================
    // Hub Cache Operations
    // ========================================================================

    /// Stores `payload` under `key`, replacing any previous value.
    ///
    /// `fetched_at` is unix seconds; freshness is judged by the reader.
    pub async fn store_payload(
        &self,
        key: &str,
        payload: &str,
        fetched_at: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO hub_cache (cache_key, payload, fetched_at)
            VALUES (?, ?, ?)
        "#,
        )
        .bind(key)
        .bind(payload)
        .bind(fetched_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Returns the payload stored under `key`, however old it is.
    pub async fn load_payload(&self, key: &str) -> Result<Option<CachedPayload>, DatabaseError> {
        let row: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT payload, fetched_at
            FROM hub_cache
            WHERE cache_key = ?
        "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(payload, fetched_at)| CachedPayload {
            payload,
            fetched_at,
        }))
    }
}
