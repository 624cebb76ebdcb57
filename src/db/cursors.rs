use super::{format_timestamp, Database};
use crate::error::StoreError;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::debug;

impl Database {
    /// Last saved pivot for a channel, `None` if the channel was never checkpointed.
    pub fn get_pivot(&self, channel_id: &str) -> Result<Option<String>, StoreError> {
        let pivot = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT last_pivot_id FROM fetch_pivot WHERE channel_id = ?1",
                    [channel_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;
        if let Some(pivot) = &pivot {
            debug!("Database: Retrieved pivot {} for channel {}", pivot, channel_id);
        }
        Ok(pivot)
    }

    pub fn save_pivot(&self, channel_id: &str, pivot_id: &str) -> Result<(), StoreError> {
        let updated_at = format_timestamp(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO fetch_pivot (channel_id, last_pivot_id, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(channel_id) DO UPDATE SET last_pivot_id = ?2, updated_at = ?3",
                (channel_id, pivot_id, &updated_at),
            )?;
            Ok(())
        })?;
        debug!("Database: Saved pivot {} for channel {}", pivot_id, channel_id);
        Ok(())
    }
}
