use anyhow::Result;

use super::schema::Database;

/// Key under which the last-notified release timestamp is stored.
const LAST_UPDATED_KEY: &str = "watch.last_updated";

impl Database {
    // ========================================================================
    // Watermark Operations
    // ========================================================================

    /// The timestamp (unix seconds) of the last successfully-notified release.
    ///
    /// Returns `0` when nothing has been seen yet, so the very first fetched
    /// release always triggers a notification. A malformed stored value is
    /// logged and treated the same way rather than blocking startup.
    pub async fn last_updated(&self) -> Result<i64> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM watch_state WHERE key = ?")
                .bind(LAST_UPDATED_KEY)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            None => Ok(0),
            Some((value,)) => match value.parse::<i64>() {
                Ok(ts) => Ok(ts),
                Err(_) => {
                    tracing::warn!(
                        value = %value,
                        "Malformed stored watermark, treating as never-notified"
                    );
                    Ok(0)
                }
            },
        }
    }

    /// Unconditionally set the watermark (UPSERT).
    pub async fn set_last_updated(&self, timestamp: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watch_state (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(LAST_UPDATED_KEY)
        .bind(timestamp.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Advance the watermark to `timestamp` only if it is strictly newer than
    /// the stored value. Returns whether it advanced.
    ///
    /// The comparison runs inside the statement, so two overlapping cycles
    /// racing on the same release resolve to a single advance regardless of
    /// launch timing; the stale writer loses.
    pub async fn advance_watermark(&self, timestamp: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO watch_state (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE
                SET value = excluded.value, updated_at = excluded.updated_at
                WHERE CAST(watch_state.value AS INTEGER) < CAST(excluded.value AS INTEGER)
        "#,
        )
        .bind(LAST_UPDATED_KEY)
        .bind(timestamp.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
