use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database path: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode reactions: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid timestamp '{0}' in stored row")]
    Timestamp(String),
    #[error("invalid flags '{0}' in stored row")]
    Flags(String),
    #[error("database lock poisoned")]
    Poisoned,
    #[error("database connection is closed")]
    Closed,
    #[error("blocking database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures that end an archiving run early.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to load cursor for channel {channel_id}: {source}")]
    CursorLookup {
        channel_id: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to fetch messages after {after} in channel {channel_id}: {source}")]
    Fetch {
        channel_id: String,
        after: String,
        #[source]
        source: anyhow::Error,
    },
}
