//! Fixed-cadence trigger for the active batch run.
//!
//! Each tick calls [`BatchOrchestrator::on_tick`]. A tick that arrives while
//! the previous trigger is still processing is counted and skipped by the
//! orchestrator; ticks missed while a long run blocks the loop are dropped
//! rather than replayed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::batch::BatchOrchestrator;

pub async fn run_scheduler_loop(
    orchestrator: Arc<BatchOrchestrator>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(every_secs = every.as_secs(), "scheduler started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => orchestrator.on_tick().await,
        }
    }

    info!("scheduler stopped");
}
