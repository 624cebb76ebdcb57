use crate::archiver::{ArchiverOptions, CutoffBoundary};
use chrono::{DateTime, Utc};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub channel_id: u64,
    pub database_url: String,

    // Archive walk settings
    pub start_pivot: String,
    pub cutoff: DateTime<Utc>,
    pub cutoff_inclusive: bool,
    pub page_size: u8,
    pub batch_delay: Duration,
    pub pace_every_batch: bool,
    pub fetch_reaction_users: bool,
}

/// First message of the channel's history, used when no pivot has been saved yet.
pub const DEFAULT_START_PIVOT: &str = "1323788890632355840";
pub const DEFAULT_CUTOFF: &str = "2025-12-01T00:00:00Z";
/// Discord's maximum page size for message history.
pub const MAX_PAGE_SIZE: u8 = 100;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let cutoff_raw = env::var("ARCHIVE_CUTOFF").unwrap_or_else(|_| DEFAULT_CUTOFF.to_string());
        let cutoff = DateTime::parse_from_rfc3339(&cutoff_raw)
            .map_err(|e| anyhow::anyhow!("ARCHIVE_CUTOFF must be an RFC 3339 instant: {}", e))?
            .with_timezone(&Utc);

        let delay_raw = env::var("ARCHIVE_BATCH_DELAY").unwrap_or_else(|_| "5s".to_string());
        let batch_delay = humantime::parse_duration(&delay_raw)
            .map_err(|e| anyhow::anyhow!("ARCHIVE_BATCH_DELAY must be a duration like '5s': {}", e))?;

        let start_pivot =
            env::var("ARCHIVE_START_ID").unwrap_or_else(|_| DEFAULT_START_PIVOT.to_string());
        if start_pivot.parse::<u64>().map_or(true, |id| id == 0) {
            anyhow::bail!("ARCHIVE_START_ID must be a non-zero message id");
        }

        let channel_id: u64 = env::var("ARCHIVE_CHANNEL_ID")
            .map_err(|_| anyhow::anyhow!("ARCHIVE_CHANNEL_ID must be set"))?
            .parse()
            .map_err(|_| anyhow::anyhow!("ARCHIVE_CHANNEL_ID must be a valid u64"))?;
        if channel_id == 0 {
            anyhow::bail!("ARCHIVE_CHANNEL_ID must be non-zero");
        }

        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            channel_id,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/chronicle.db".to_string()),
            start_pivot,
            cutoff,
            cutoff_inclusive: env::var("ARCHIVE_CUTOFF_INCLUSIVE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            page_size: env::var("ARCHIVE_PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse::<u32>()
                .map(|n| n.clamp(1, MAX_PAGE_SIZE as u32) as u8)
                .unwrap_or(MAX_PAGE_SIZE),
            batch_delay,
            pace_every_batch: env::var("ARCHIVE_PACE_EVERY_BATCH")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            fetch_reaction_users: env::var("ARCHIVE_FETCH_REACTION_USERS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }

    pub fn archiver_options(&self) -> ArchiverOptions {
        ArchiverOptions {
            seed_pivot: self.start_pivot.clone(),
            cutoff: self.cutoff,
            boundary: if self.cutoff_inclusive {
                CutoffBoundary::Inclusive
            } else {
                CutoffBoundary::Exclusive
            },
            page_size: self.page_size,
            batch_delay: self.batch_delay,
            pace_every_batch: self.pace_every_batch,
            fetch_reaction_users: self.fetch_reaction_users,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("database_url", &self.database_url)
            .field("start_pivot", &self.start_pivot)
            .field("cutoff", &self.cutoff)
            .field("cutoff_inclusive", &self.cutoff_inclusive)
            .field("page_size", &self.page_size)
            .field("batch_delay", &humantime::format_duration(self.batch_delay).to_string())
            .field("pace_every_batch", &self.pace_every_batch)
            .field("fetch_reaction_users", &self.fetch_reaction_users)
            .finish()
    }
}
