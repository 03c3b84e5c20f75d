use anyhow::Result;
use async_trait::async_trait;

use crate::records::model::{IdentityKey, StoredRecord};

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn exists(&self, key: IdentityKey) -> Result<bool>;

    /// Inserts `records` in one transaction. Any failing row rolls back the
    /// whole call.
    async fn insert_batch(&self, records: &[StoredRecord]) -> Result<()>;
}
