//! Archived message records and the outcomes of archiving them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One archived chat message, as stored in the `messages` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub message_id: String,
    pub content: String,
    pub author: String,
    pub channel: String,
    pub guild: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
    pub reactions: Vec<ReactionRecord>,
    pub kind: u8,
    pub flags: u64,
    pub pinned: bool,
}

/// Emoji descriptor. Custom emoji carry an id, standard emoji only a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Emoji {
    Custom {
        id: String,
        name: Option<String>,
        animated: bool,
    },
    Unicode {
        name: String,
    },
}

impl std::fmt::Display for Emoji {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emoji::Custom { id, name, animated } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{}:{}:{}>", prefix, name.as_deref().unwrap_or(""), id)
            }
            Emoji::Unicode { name } => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub emoji: Emoji,
    pub count: u64,
    pub me: bool,
    /// Best-effort: left empty when the users could not be fetched.
    pub users: Vec<ReactingUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactingUser {
    pub id: String,
    pub tag: String,
    pub username: String,
    pub bot: bool,
}

/// Result of a repository write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// A record with the same id already existed and was left untouched.
    Skipped,
}

/// Result of one archiving attempt as seen by the archiver loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAttempt {
    Saved,
    Skipped,
    Failed(String),
}

impl From<SaveOutcome> for SaveAttempt {
    fn from(outcome: SaveOutcome) -> Self {
        match outcome {
            SaveOutcome::Saved => SaveAttempt::Saved,
            SaveOutcome::Skipped => SaveAttempt::Skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emoji_serializes_like_discord_descriptor() {
        let custom = Emoji::Custom {
            id: "42".to_string(),
            name: Some("party".to_string()),
            animated: true,
        };
        let json = serde_json::to_value(&custom).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "42", "name": "party", "animated": true })
        );

        let unicode = Emoji::Unicode {
            name: "👍".to_string(),
        };
        let json = serde_json::to_value(&unicode).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "👍" }));

        // Name-only objects must not be mistaken for custom emoji.
        let parsed: Emoji = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, unicode);
    }

    #[test]
    fn test_emoji_display() {
        let custom = Emoji::Custom {
            id: "42".to_string(),
            name: Some("party".to_string()),
            animated: false,
        };
        assert_eq!(custom.to_string(), "<:party:42>");
        let unicode = Emoji::Unicode {
            name: "🔥".to_string(),
        };
        assert_eq!(unicode.to_string(), "🔥");
    }
}
