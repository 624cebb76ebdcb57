//! Storage seams used by the archiver, implemented for [`Database`].

use crate::db::Database;
use crate::error::StoreError;
use crate::model::{ArchivedMessage, SaveOutcome};
use async_trait::async_trait;

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, channel_id: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, channel_id: &str, pivot_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn exists(&self, message_id: &str) -> Result<bool, StoreError>;
    async fn save(&self, message: ArchivedMessage) -> Result<SaveOutcome, StoreError>;
    async fn count(&self, channel_id: &str) -> Result<u64, StoreError>;
}

#[async_trait]
impl CursorStore for Database {
    async fn get(&self, channel_id: &str) -> Result<Option<String>, StoreError> {
        let channel_id = channel_id.to_string();
        self.run_blocking(move |db| db.get_pivot(&channel_id)).await
    }

    async fn put(&self, channel_id: &str, pivot_id: &str) -> Result<(), StoreError> {
        let channel_id = channel_id.to_string();
        let pivot_id = pivot_id.to_string();
        self.run_blocking(move |db| db.save_pivot(&channel_id, &pivot_id))
            .await
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn exists(&self, message_id: &str) -> Result<bool, StoreError> {
        let message_id = message_id.to_string();
        self.run_blocking(move |db| db.message_exists(&message_id))
            .await
    }

    async fn save(&self, message: ArchivedMessage) -> Result<SaveOutcome, StoreError> {
        self.run_blocking(move |db| db.save_archived_message(&message))
            .await
    }

    async fn count(&self, channel_id: &str) -> Result<u64, StoreError> {
        let channel_id = channel_id.to_string();
        self.run_blocking(move |db| db.count_channel_messages(&channel_id))
            .await
    }
}
