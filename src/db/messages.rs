use super::{format_timestamp, parse_timestamp, Database};
use crate::error::StoreError;
use crate::model::{ArchivedMessage, SaveOutcome};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

fn exists_in(conn: &Connection, message_id: &str) -> Result<bool, StoreError> {
    Ok(conn
        .prepare_cached("SELECT 1 FROM messages WHERE message_id = ?1")?
        .exists([message_id])?)
}

impl Database {
    pub fn message_exists(&self, message_id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| exists_in(conn, message_id))
    }

    /// Inserts the record unless one with the same id is already archived.
    ///
    /// Stored rows are never overwritten: the first write wins.
    pub fn save_archived_message(
        &self,
        message: &ArchivedMessage,
    ) -> Result<SaveOutcome, StoreError> {
        let reactions = serde_json::to_string(&message.reactions)?;
        let outcome = self.with_conn(|conn| {
            if exists_in(conn, &message.message_id)? {
                return Ok(SaveOutcome::Skipped);
            }
            let inserted = conn.execute(
                "INSERT INTO messages (message_id, content, author_id, channel_id, guild_id,
                    created_at, edited_at, saved_at, reactions, kind, flags, pinned)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(message_id) DO NOTHING",
                rusqlite::params![
                    message.message_id,
                    message.content,
                    message.author,
                    message.channel,
                    message.guild,
                    format_timestamp(&message.created_at),
                    message.edited_at.as_ref().map(format_timestamp),
                    format_timestamp(&message.saved_at),
                    reactions,
                    message.kind,
                    message.flags.to_string(),
                    message.pinned,
                ],
            )?;
            Ok(if inserted == 0 {
                SaveOutcome::Skipped
            } else {
                SaveOutcome::Saved
            })
        })?;

        match outcome {
            SaveOutcome::Saved => debug!("Database: Saved message {}", message.message_id),
            SaveOutcome::Skipped => debug!(
                "Database: Message {} already exists, skipping",
                message.message_id
            ),
        }
        Ok(outcome)
    }

    pub fn count_channel_messages(&self, channel_id: &str) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
                [channel_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    pub fn get_archived_message(
        &self,
        message_id: &str,
    ) -> Result<Option<ArchivedMessage>, StoreError> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT message_id, content, author_id, channel_id, guild_id, created_at,
                        edited_at, saved_at, reactions, kind, flags, pinned
                     FROM messages WHERE message_id = ?1",
                    [message_id],
                    |row| {
                        Ok(StoredRow {
                            message_id: row.get(0)?,
                            content: row.get(1)?,
                            author: row.get(2)?,
                            channel: row.get(3)?,
                            guild: row.get(4)?,
                            created_at: row.get(5)?,
                            edited_at: row.get(6)?,
                            saved_at: row.get(7)?,
                            reactions: row.get(8)?,
                            kind: row.get(9)?,
                            flags: row.get(10)?,
                            pinned: row.get(11)?,
                        })
                    },
                )
                .optional()?)
        })?;

        row.map(StoredRow::into_message).transpose()
    }
}

struct StoredRow {
    message_id: String,
    content: String,
    author: String,
    channel: String,
    guild: String,
    created_at: String,
    edited_at: Option<String>,
    saved_at: String,
    reactions: String,
    kind: u8,
    flags: String,
    pinned: bool,
}

impl StoredRow {
    fn into_message(self) -> Result<ArchivedMessage, StoreError> {
        Ok(ArchivedMessage {
            message_id: self.message_id,
            content: self.content,
            author: self.author,
            channel: self.channel,
            guild: self.guild,
            created_at: parse_timestamp(&self.created_at)?,
            edited_at: self.edited_at.as_deref().map(parse_timestamp).transpose()?,
            saved_at: parse_timestamp(&self.saved_at)?,
            reactions: serde_json::from_str(&self.reactions)?,
            kind: self.kind,
            flags: self
                .flags
                .parse()
                .map_err(|_| StoreError::Flags(self.flags.clone()))?,
            pinned: self.pinned,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;
    use crate::model::{ArchivedMessage, Emoji, ReactingUser, ReactionRecord, SaveOutcome};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, channel: &str, content: &str) -> ArchivedMessage {
        ArchivedMessage {
            message_id: id.to_string(),
            content: content.to_string(),
            author: "u1".to_string(),
            channel: channel.to_string(),
            guild: "g1".to_string(),
            created_at: Utc.timestamp_millis_opt(1_764_547_200_123).unwrap(),
            edited_at: None,
            saved_at: Utc.timestamp_millis_opt(1_765_000_000_000).unwrap(),
            reactions: vec![ReactionRecord {
                emoji: Emoji::Unicode {
                    name: "👍".to_string(),
                },
                count: 1,
                me: false,
                users: vec![ReactingUser {
                    id: "u2".to_string(),
                    tag: "bob".to_string(),
                    username: "bob".to_string(),
                    bot: false,
                }],
            }],
            kind: 0,
            flags: 4,
            pinned: true,
        }
    }

    #[test]
    fn test_high_flag_bits_stored_as_unsigned_text() {
        let db = test_db();
        let mut message = record("m9", "c1", "flagged");
        message.flags = 1 << 63;
        db.save_archived_message(&message).unwrap();

        let raw: String = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT flags FROM messages WHERE message_id = 'm9'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(raw, "9223372036854775808");
        assert_eq!(db.get_archived_message("m9").unwrap().unwrap().flags, 1 << 63);
    }

    #[test]
    fn test_save_then_skip_keeps_first_write() {
        let db = test_db();
        let first = record("m1", "c1", "original");

        assert_eq!(db.save_archived_message(&first).unwrap(), SaveOutcome::Saved);

        let mut second = first.clone();
        second.content = "edited later".to_string();
        second.reactions.clear();
        assert_eq!(
            db.save_archived_message(&second).unwrap(),
            SaveOutcome::Skipped
        );

        let stored = db.get_archived_message("m1").unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[test]
    fn test_exists_and_count() {
        let db = test_db();
        assert!(!db.message_exists("m1").unwrap());
        assert_eq!(db.count_channel_messages("c1").unwrap(), 0);

        db.save_archived_message(&record("m1", "c1", "a")).unwrap();
        db.save_archived_message(&record("m2", "c1", "b")).unwrap();
        db.save_archived_message(&record("m3", "c2", "c")).unwrap();
        db.save_archived_message(&record("m1", "c1", "dup")).unwrap();

        assert!(db.message_exists("m1").unwrap());
        assert_eq!(db.count_channel_messages("c1").unwrap(), 2);
        assert_eq!(db.count_channel_messages("c2").unwrap(), 1);
    }

    #[test]
    fn test_edited_timestamp_round_trips() {
        let db = test_db();
        let mut msg = record("m1", "c1", "a");
        msg.edited_at = Some(Utc.timestamp_millis_opt(1_764_600_000_999).unwrap());
        db.save_archived_message(&msg).unwrap();

        let stored = db.get_archived_message("m1").unwrap().unwrap();
        assert_eq!(stored.edited_at, msg.edited_at);
        assert!(db.get_archived_message("missing").unwrap().is_none());
    }
}
