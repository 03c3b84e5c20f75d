use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::batch::model::{BatchCheckpoint, BatchRun, RunState};
use crate::batch::repository::BatchStateRepository;
use crate::logger::warn_if_slow;

/// Durable progress markers and the run registry behind one front.
pub struct StateTracker {
    repo: Arc<dyn BatchStateRepository>,
}

impl StateTracker {
    pub fn new(repo: Arc<dyn BatchStateRepository>) -> Self {
        Self { repo }
    }

    /// Returns the stored checkpoint, or a fresh one if the run has none yet.
    #[instrument(skip(self), target = "store")]
    pub async fn load(&self, run_id: &str) -> Result<BatchCheckpoint> {
        let found = warn_if_slow("db_load_checkpoint", Duration::from_millis(50), async {
            self.repo.load_checkpoint(run_id).await
        })
        .await
        .context("failed to load checkpoint")?;

        match found {
            Some(cp) => Ok(cp),
            None => {
                debug!("no checkpoint stored; starting fresh");
                Ok(BatchCheckpoint::fresh(run_id))
            }
        }
    }

    #[instrument(
        skip(self, checkpoint),
        target = "store",
        fields(run_id = %checkpoint.run_id, completed = checkpoint.completed)
    )]
    pub async fn save(&self, checkpoint: &BatchCheckpoint) -> Result<()> {
        warn_if_slow("db_save_checkpoint", Duration::from_millis(50), async {
            self.repo.save_checkpoint(checkpoint).await
        })
        .await
        .context("failed to save checkpoint")
    }

    /// Persists a newly configured run together with its fresh checkpoint.
    #[instrument(skip(self, run), target = "store", fields(run_id = %run.run_id))]
    pub async fn register(&self, run: &BatchRun) -> Result<BatchCheckpoint> {
        self.repo
            .save_run(run, RunState::Configured)
            .await
            .context("failed to register run")?;

        let checkpoint = BatchCheckpoint::fresh(&run.run_id);
        self.save(&checkpoint).await?;

        info!("run registered");
        Ok(checkpoint)
    }

    #[instrument(skip(self), target = "store", fields(state = state.as_str()))]
    pub async fn set_state(&self, run_id: &str, state: RunState) -> Result<()> {
        warn_if_slow("db_update_run_state", Duration::from_millis(50), async {
            self.repo.update_run_state(run_id, state).await
        })
        .await
        .with_context(|| format!("failed to move run to {}", state.as_str()))
    }

    /// Latest run that was configured but never reached a terminal state.
    #[instrument(skip(self), target = "store")]
    pub async fn resumable(&self) -> Result<Option<(BatchRun, RunState)>> {
        self.repo
            .latest_active_run()
            .await
            .context("failed to look up resumable run")
    }
}
