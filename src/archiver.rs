//! Checkpointed pagination over one channel's history.
//!
//! Each iteration fetches the page after the current pivot, archives it in the
//! order received and, if the whole page was processed without crossing the
//! cutoff, persists the newest id as the new pivot. A page that trips the
//! cutoff is never checkpointed, so a restart re-scans it and stops at the same
//! message.

use crate::error::ArchiveError;
use crate::model::{ArchivedMessage, ReactionRecord, SaveAttempt};
use crate::source::{MessageSource, SourceMessage};
use crate::store::{CursorStore, MessageStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Which side of the cutoff instant the boundary message falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoffBoundary {
    /// Messages at exactly the cutoff are not archived.
    #[default]
    Exclusive,
    /// Messages at exactly the cutoff are archived.
    Inclusive,
}

impl CutoffBoundary {
    pub fn reached(self, created_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
        match self {
            CutoffBoundary::Exclusive => created_at <= cutoff,
            CutoffBoundary::Inclusive => created_at < cutoff,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiverOptions {
    /// Pivot used when the channel has no saved cursor.
    pub seed_pivot: String,
    pub cutoff: DateTime<Utc>,
    pub boundary: CutoffBoundary,
    pub page_size: u8,
    pub batch_delay: Duration,
    /// Delay after every batch instead of only after full ones.
    pub pace_every_batch: bool,
    pub fetch_reaction_users: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Exhausted,
    CutoffReached { message_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub iterations: u64,
    pub fetched: u64,
    pub saved: u64,
    pub skipped: u64,
    pub failed: u64,
    pub stop: StopReason,
    /// Pivot the next fetch would have used.
    pub last_pivot: String,
}

pub struct Archiver {
    source: Arc<dyn MessageSource>,
    messages: Arc<dyn MessageStore>,
    cursors: Arc<dyn CursorStore>,
    options: ArchiverOptions,
}

impl Archiver {
    pub fn new(
        source: Arc<dyn MessageSource>,
        messages: Arc<dyn MessageStore>,
        cursors: Arc<dyn CursorStore>,
        options: ArchiverOptions,
    ) -> Self {
        Self {
            source,
            messages,
            cursors,
            options,
        }
    }

    pub async fn run(&self, channel_id: &str) -> Result<ArchiveReport, ArchiveError> {
        let page_size = self.options.page_size.clamp(1, 100);
        info!(
            "Archiving channel {} back to {} ({:?} boundary)",
            channel_id, self.options.cutoff, self.options.boundary
        );

        let mut pivot = match self.cursors.get(channel_id).await {
            Ok(Some(pivot)) => {
                info!("Resuming from saved pivot: {}", pivot);
                pivot
            }
            Ok(None) => {
                info!(
                    "No saved pivot found, starting from: {}",
                    self.options.seed_pivot
                );
                self.options.seed_pivot.clone()
            }
            Err(source) => {
                return Err(ArchiveError::CursorLookup {
                    channel_id: channel_id.to_string(),
                    source,
                })
            }
        };

        let mut iterations = 0u64;
        let mut fetched = 0u64;
        let mut saved = 0u64;
        let mut skipped = 0u64;
        let mut failed = 0u64;

        let stop = loop {
            iterations += 1;
            debug!("Fetch iteration {}, pivot: {}", iterations, pivot);

            let started = Instant::now();
            let batch = self
                .source
                .fetch_batch(channel_id, &pivot, page_size)
                .await
                .map_err(|source| ArchiveError::Fetch {
                    channel_id: channel_id.to_string(),
                    after: pivot.clone(),
                    source,
                })?;
            info!(
                "Fetched {} messages in iteration {} (took {}ms)",
                batch.len(),
                iterations,
                started.elapsed().as_millis()
            );

            let Some(newest) = batch.first().map(|m| m.id.clone()) else {
                info!("No more messages to fetch");
                break StopReason::Exhausted;
            };
            let batch_len = batch.len();
            fetched += batch_len as u64;

            let mut cutoff_at = None;
            for message in batch {
                if self
                    .options
                    .boundary
                    .reached(message.created_at, self.options.cutoff)
                {
                    info!(
                        "Reached cutoff at message {} ({})",
                        message.id, message.created_at
                    );
                    cutoff_at = Some(message.id);
                    break;
                }

                debug!(
                    "Message: [{}] [{}] {}",
                    message.author_tag,
                    message.created_at,
                    preview(&message.content)
                );

                let message_id = message.id.clone();
                match self.archive_message(channel_id, message).await {
                    SaveAttempt::Saved => {
                        saved += 1;
                        debug!("Saved message {} (total: {})", message_id, saved);
                    }
                    SaveAttempt::Skipped => {
                        skipped += 1;
                        debug!("Message {} already archived, skipping", message_id);
                    }
                    SaveAttempt::Failed(reason) => {
                        failed += 1;
                        error!("Failed to save message {}: {}", message_id, reason);
                    }
                }
            }

            if let Some(message_id) = cutoff_at {
                info!("Stopping fetch process, cutoff date reached");
                break StopReason::CutoffReached { message_id };
            }

            match self.cursors.put(channel_id, &newest).await {
                Ok(()) => debug!("Saved pivot: {}", newest),
                Err(e) => error!("Failed to save pivot {}: {}", newest, e),
            }
            pivot = newest;
            info!("Running total: {} saved, {} skipped", saved, skipped);

            if batch_len == page_size as usize || self.options.pace_every_batch {
                debug!(
                    "Waiting {}ms to respect rate limits...",
                    self.options.batch_delay.as_millis()
                );
                tokio::time::sleep(self.options.batch_delay).await;
            }
        };

        let report = ArchiveReport {
            iterations,
            fetched,
            saved,
            skipped,
            failed,
            stop,
            last_pivot: pivot,
        };
        if report.failed > 0 {
            warn!(
                "{} messages failed to save and will be retried on the next run",
                report.failed
            );
        }
        info!(
            "Archive run finished after {} iterations: {} fetched, {} saved, {} skipped, {} failed",
            report.iterations, report.fetched, report.saved, report.skipped, report.failed
        );
        Ok(report)
    }

    async fn archive_message(&self, channel_id: &str, message: SourceMessage) -> SaveAttempt {
        // Checked before enrichment so re-runs skip the reaction-user fetches.
        match self.messages.exists(&message.id).await {
            Ok(true) => return SaveAttempt::Skipped,
            Ok(false) => {}
            Err(e) => return SaveAttempt::Failed(e.to_string()),
        }

        let reactions = self.collect_reactions(channel_id, &message).await;
        let record = ArchivedMessage {
            message_id: message.id,
            content: message.content,
            author: message.author_id,
            channel: message.channel_id,
            guild: message.guild_id.unwrap_or_default(),
            created_at: message.created_at,
            edited_at: message.edited_at,
            saved_at: Utc::now(),
            reactions,
            kind: message.kind,
            flags: message.flags,
            pinned: message.pinned,
        };

        match self.messages.save(record).await {
            Ok(outcome) => outcome.into(),
            Err(e) => SaveAttempt::Failed(e.to_string()),
        }
    }

    async fn collect_reactions(
        &self,
        channel_id: &str,
        message: &SourceMessage,
    ) -> Vec<ReactionRecord> {
        let mut reactions = Vec::with_capacity(message.reactions.len());
        for reaction in &message.reactions {
            let users = if self.options.fetch_reaction_users {
                match self
                    .source
                    .reaction_users(channel_id, &message.id, &reaction.emoji)
                    .await
                {
                    Ok(users) => users,
                    Err(e) => {
                        debug!(
                            "Could not fetch reaction users for {} on {}: {}",
                            reaction.emoji, message.id, e
                        );
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            reactions.push(ReactionRecord {
                emoji: reaction.emoji.clone(),
                count: reaction.count,
                me: reaction.me,
                users,
            });
        }
        reactions
    }
}

fn preview(content: &str) -> String {
    let mut snippet: String = content.chars().take(50).collect();
    if content.chars().count() > 50 {
        snippet.push_str("...");
    }
    snippet
}
