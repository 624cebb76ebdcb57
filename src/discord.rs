//! [`MessageSource`] over the Discord REST API.

use crate::model::{Emoji, ReactingUser};
use crate::source::{MessageSource, SourceMessage, SourceReaction};
use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{
    Channel, ChannelId, EmojiId, GetMessages, GuildId, Message, MessageId, ReactionType,
    Timestamp, UserId,
};
use serenity::http::Http;
use std::sync::Arc;
use tracing::debug;

/// Discord caps both message and reaction-user pages at 100.
const DISCORD_PAGE_LIMIT: u8 = 100;

pub struct DiscordSource {
    http: Arc<Http>,
    guild_id: Option<GuildId>,
}

/// What the target channel resolved to at startup.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub id: ChannelId,
    pub name: String,
    pub guild_id: Option<GuildId>,
}

impl DiscordSource {
    pub fn new(http: Arc<Http>, guild_id: Option<GuildId>) -> Self {
        Self { http, guild_id }
    }

    /// Looks up the channel so a bad id or missing permission fails before archiving starts.
    pub async fn resolve_channel(http: &Http, channel_id: u64) -> anyhow::Result<ResolvedChannel> {
        let id = parse_channel(&channel_id.to_string())?;
        let channel = http
            .get_channel(id)
            .await
            .with_context(|| format!("Failed to resolve channel {}", channel_id))?;

        let resolved = match channel {
            Channel::Guild(gc) => ResolvedChannel {
                id,
                name: gc.name,
                guild_id: Some(gc.guild_id),
            },
            Channel::Private(pc) => ResolvedChannel {
                id,
                name: pc.recipient.name,
                guild_id: None,
            },
            other => anyhow::bail!("Channel {} is not a text channel: {:?}", channel_id, other),
        };
        Ok(resolved)
    }
}

#[async_trait]
impl MessageSource for DiscordSource {
    async fn fetch_batch(
        &self,
        channel_id: &str,
        after: &str,
        limit: u8,
    ) -> anyhow::Result<Vec<SourceMessage>> {
        let channel = parse_channel(channel_id)?;
        let after = parse_snowflake(after, "pagination cursor")?;

        let builder = GetMessages::new()
            .after(MessageId::new(after))
            .limit(limit.clamp(1, DISCORD_PAGE_LIMIT));
        let mut messages = channel.messages(&*self.http, builder).await?;

        // Discord returns newest-first; keep that order even if a page arrives unsorted.
        messages.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(messages
            .into_iter()
            .map(|msg| to_source_message(msg, self.guild_id))
            .collect())
    }

    async fn reaction_users(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &Emoji,
    ) -> anyhow::Result<Vec<ReactingUser>> {
        let channel = parse_channel(channel_id)?;
        let message = MessageId::new(parse_snowflake(message_id, "message id")?);
        let reaction = to_reaction_type(emoji)?;

        let mut users = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let page = channel
                .reaction_users(
                    &*self.http,
                    message,
                    reaction.clone(),
                    Some(DISCORD_PAGE_LIMIT),
                    after,
                )
                .await?;
            let page_len = page.len();
            after = page.last().map(|u| u.id);
            users.extend(page.into_iter().map(|user| ReactingUser {
                id: user.id.to_string(),
                tag: user.tag(),
                username: user.name.clone(),
                bot: user.bot,
            }));
            if page_len < DISCORD_PAGE_LIMIT as usize || after.is_none() {
                break;
            }
        }

        debug!(
            "Fetched {} users for reaction {} on message {}",
            users.len(),
            emoji,
            message_id
        );
        Ok(users)
    }
}

/// Snowflakes are non-zero; serenity's id constructors panic on zero.
fn parse_snowflake(raw: &str, what: &str) -> anyhow::Result<u64> {
    let id: u64 = raw
        .parse()
        .with_context(|| format!("Invalid {} '{}'", what, raw))?;
    if id == 0 {
        anyhow::bail!("Invalid {} '{}': must be non-zero", what, raw);
    }
    Ok(id)
}

fn parse_channel(channel_id: &str) -> anyhow::Result<ChannelId> {
    Ok(ChannelId::new(parse_snowflake(channel_id, "channel id")?))
}

fn to_reaction_type(emoji: &Emoji) -> anyhow::Result<ReactionType> {
    Ok(match emoji {
        Emoji::Custom { id, name, animated } => ReactionType::Custom {
            animated: *animated,
            id: EmojiId::new(parse_snowflake(id, "emoji id")?),
            name: name.clone(),
        },
        Emoji::Unicode { name } => ReactionType::Unicode(name.clone()),
    })
}

fn to_emoji(reaction: &ReactionType) -> Emoji {
    match reaction {
        ReactionType::Custom { animated, id, name } => Emoji::Custom {
            id: id.to_string(),
            name: name.clone(),
            animated: *animated,
        },
        ReactionType::Unicode(name) => Emoji::Unicode { name: name.clone() },
        other => Emoji::Unicode {
            name: other.to_string(),
        },
    }
}

/// With serenity's `chrono` feature a `Timestamp` derefs to `DateTime<Utc>`.
fn to_utc(ts: &Timestamp) -> DateTime<Utc> {
    **ts
}

/// REST payloads omit `guild_id`, so the guild of the resolved channel is used instead.
pub(crate) fn to_source_message(msg: Message, fallback_guild: Option<GuildId>) -> SourceMessage {
    SourceMessage {
        id: msg.id.to_string(),
        author_id: msg.author.id.to_string(),
        author_tag: msg.author.tag(),
        channel_id: msg.channel_id.to_string(),
        guild_id: msg.guild_id.or(fallback_guild).map(|id| id.to_string()),
        created_at: to_utc(&msg.timestamp),
        edited_at: msg.edited_timestamp.as_ref().map(to_utc),
        reactions: msg
            .reactions
            .iter()
            .map(|r| SourceReaction {
                emoji: to_emoji(&r.reaction_type),
                count: r.count,
                me: r.me,
            })
            .collect(),
        kind: u8::from(msg.kind),
        flags: msg.flags.map(|f| f.bits()).unwrap_or(0),
        pinned: msg.pinned,
        content: msg.content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::{MessageFlags, User};

    fn mock_message(id: u64, content: &str) -> Message {
        let mut msg = Message::default();
        msg.id = MessageId::new(id);
        msg.channel_id = ChannelId::new(55);
        msg.author = User::default();
        msg.author.id = UserId::new(7);
        msg.author.name = "alice".to_string();
        msg.content = content.to_string();
        msg.timestamp = Timestamp::from_unix_timestamp(1_764_547_200).unwrap();
        msg
    }

    #[test]
    fn test_source_message_uses_fallback_guild() {
        let mut msg = mock_message(1010, "hello");
        msg.pinned = true;
        msg.flags = Some(MessageFlags::from_bits_truncate(4));

        let converted = to_source_message(msg, Some(GuildId::new(99)));
        assert_eq!(converted.id, "1010");
        assert_eq!(converted.author_id, "7");
        assert_eq!(converted.channel_id, "55");
        assert_eq!(converted.guild_id.as_deref(), Some("99"));
        assert_eq!(converted.content, "hello");
        assert_eq!(converted.created_at.timestamp(), 1_764_547_200);
        assert_eq!(converted.edited_at, None);
        assert_eq!(converted.flags, 4);
        assert!(converted.pinned);
        assert!(converted.reactions.is_empty());
    }

    #[test]
    fn test_timestamps_keep_millisecond_precision() {
        let mut msg = mock_message(1010, "hello");
        msg.timestamp = Timestamp::parse("2025-12-01T00:00:00.123Z").unwrap();
        msg.edited_timestamp = Some(Timestamp::parse("2025-12-01T00:05:30.987+00:00").unwrap());

        let converted = to_source_message(msg, None);
        assert_eq!(converted.created_at.timestamp(), 1_764_547_200);
        assert_eq!(converted.created_at.timestamp_subsec_millis(), 123);
        let edited = converted.edited_at.unwrap();
        assert_eq!(edited.timestamp(), 1_764_547_530);
        assert_eq!(edited.timestamp_subsec_millis(), 987);
    }

    #[test]
    fn test_source_message_prefers_payload_guild() {
        let mut msg = mock_message(1, "x");
        msg.guild_id = Some(GuildId::new(3));
        let converted = to_source_message(msg, Some(GuildId::new(99)));
        assert_eq!(converted.guild_id.as_deref(), Some("3"));

        let converted = to_source_message(mock_message(2, "y"), None);
        assert_eq!(converted.guild_id, None);
    }

    #[test]
    fn test_emoji_conversion_both_ways() {
        let custom = Emoji::Custom {
            id: "123".to_string(),
            name: Some("blob".to_string()),
            animated: true,
        };
        let reaction = to_reaction_type(&custom).unwrap();
        assert_eq!(to_emoji(&reaction), custom);

        let unicode = Emoji::Unicode {
            name: "🎉".to_string(),
        };
        let reaction = to_reaction_type(&unicode).unwrap();
        assert_eq!(to_emoji(&reaction), unicode);

        let bad = Emoji::Custom {
            id: "not-a-number".to_string(),
            name: None,
            animated: false,
        };
        assert!(to_reaction_type(&bad).is_err());
    }

    #[test]
    fn test_parse_channel_rejects_garbage() {
        assert_eq!(parse_channel("42").unwrap(), ChannelId::new(42));
        assert!(parse_channel("general").is_err());
        assert!(parse_channel("0").is_err());
    }
}
