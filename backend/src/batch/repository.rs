use anyhow::Result;
use async_trait::async_trait;

use crate::batch::model::{BatchCheckpoint, BatchRun, RunState};

#[async_trait]
pub trait BatchStateRepository: Send + Sync {
    async fn load_checkpoint(&self, run_id: &str) -> Result<Option<BatchCheckpoint>>;

    /// Upsert keyed by run id.
    async fn save_checkpoint(&self, checkpoint: &BatchCheckpoint) -> Result<()>;

    async fn save_run(&self, run: &BatchRun, state: RunState) -> Result<()>;

    async fn update_run_state(&self, run_id: &str, state: RunState) -> Result<()>;

    /// Most recently created run still in an active state.
    async fn latest_active_run(&self) -> Result<Option<(BatchRun, RunState)>>;
}
