mod cursors;
mod messages;

use crate::config::Config;
use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Handle to the single archive connection.
///
/// Cloning shares the connection. It is opened once at startup and closed once
/// with [`Database::close`]; every call after that fails with
/// [`StoreError::Closed`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if path != ":memory:" && !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        if path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        info!("Database: opened {}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    pub fn execute_init(&self) -> Result<(), StoreError> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS messages (
                message_id TEXT PRIMARY KEY NOT NULL,
                content TEXT NOT NULL,
                author_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                guild_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                edited_at TEXT,
                saved_at TEXT NOT NULL,
                reactions TEXT NOT NULL DEFAULT '[]',
                kind INTEGER NOT NULL,
                flags TEXT NOT NULL DEFAULT '0',
                pinned BOOLEAN NOT NULL DEFAULT FALSE
            );
            CREATE INDEX IF NOT EXISTS idx_messages_author ON messages (author_id);
            CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages (channel_id);
            CREATE INDEX IF NOT EXISTS idx_messages_created ON messages (created_at DESC);

            CREATE TABLE IF NOT EXISTS fetch_pivot (
                channel_id TEXT PRIMARY KEY NOT NULL,
                last_pivot_id TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ";
        self.with_conn(|conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
            info!("Database: connection closed");
        }
        Ok(())
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp(raw.to_string()))
}

#[cfg(test)]
pub(crate) fn test_db() -> Database {
    let db = Database::open(":memory:").unwrap();
    db.execute_init().unwrap();
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init_is_repeatable() {
        let db = test_db();
        db.execute_init().unwrap();

        let tables: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                let mut names = Vec::new();
                for row in rows {
                    names.push(row?);
                }
                Ok(names)
            })
            .unwrap();
        assert_eq!(tables, vec!["fetch_pivot".to_string(), "messages".to_string()]);
    }

    #[test]
    fn test_close_rejects_further_use() {
        let db = test_db();
        db.close().unwrap();
        db.close().unwrap();

        let result = db.execute_init();
        assert!(matches!(result, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_run_blocking_shares_connection() {
        let db = test_db();
        let count = db
            .run_blocking(|db| {
                db.with_conn(|conn| {
                    conn.execute(
                        "INSERT INTO fetch_pivot (channel_id, last_pivot_id, updated_at) VALUES ('c', 'p', 'now')",
                        [],
                    )?;
                    Ok(())
                })?;
                db.with_conn(|conn| {
                    Ok(conn.query_row("SELECT COUNT(*) FROM fetch_pivot", [], |row| {
                        row.get::<_, i64>(0)
                    })?)
                })
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_timestamp_keeps_millis() {
        let ts = DateTime::parse_from_rfc3339("2025-12-01T10:20:30.456Z")
            .unwrap()
            .with_timezone(&Utc);
        let raw = format_timestamp(&ts);
        assert_eq!(raw, "2025-12-01T10:20:30.456Z");
        assert_eq!(parse_timestamp(&raw).unwrap(), ts);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
