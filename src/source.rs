//! The narrow view of the chat platform the archiver depends on.

use crate::model::{Emoji, ReactingUser};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A message as delivered by the platform, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMessage {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub author_tag: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub reactions: Vec<SourceReaction>,
    pub kind: u8,
    pub flags: u64,
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceReaction {
    pub emoji: Emoji,
    pub count: u64,
    pub me: bool,
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Up to `limit` messages strictly after `after`, newest first.
    async fn fetch_batch(
        &self,
        channel_id: &str,
        after: &str,
        limit: u8,
    ) -> anyhow::Result<Vec<SourceMessage>>;

    /// Users who reacted to a message with `emoji`.
    async fn reaction_users(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &Emoji,
    ) -> anyhow::Result<Vec<ReactingUser>>;
}
