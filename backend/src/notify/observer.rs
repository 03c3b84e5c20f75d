use std::time::Duration;

use tracing::{info, warn};

use crate::batch::partition::Interval;
use crate::records::store::IngestReport;

/// Human-facing progress stream of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    RunConfigured {
        run_id: String,
        total_intervals: u64,
    },
    IntervalStarted {
        ordinal: u64,
        total: u64,
        interval: Interval,
    },
    IntervalCompleted {
        ordinal: u64,
        interval: Interval,
        report: IngestReport,
    },
    Progress {
        percent: u8,
        eta: Option<Duration>,
    },
    RetryCountdown {
        attempt: u32,
        remaining_minutes: u64,
    },
    RunCompleted {
        run_id: String,
        report: IngestReport,
        elapsed: Duration,
    },
    RunAborted {
        run_id: String,
        attempts: u32,
    },
    WaitInterrupted {
        run_id: String,
    },
}

pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Streams events to the log under the `sync` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::RunConfigured {
                run_id,
                total_intervals,
            } => info!(target: "sync", %run_id, total_intervals, "run configured"),
            SyncEvent::IntervalStarted {
                ordinal,
                total,
                interval,
            } => info!(target: "sync", ordinal, total, %interval, "processing interval"),
            SyncEvent::IntervalCompleted {
                ordinal,
                interval,
                report,
            } => info!(
                target: "sync",
                ordinal,
                %interval,
                fetched = report.fetched,
                invalid = report.invalid,
                duplicate = report.duplicate,
                inserted = report.inserted,
                "interval done"
            ),
            SyncEvent::Progress { percent, eta } => info!(
                target: "sync",
                percent,
                eta_secs = eta.map(|d| d.as_secs()),
                "progress"
            ),
            SyncEvent::RetryCountdown {
                attempt,
                remaining_minutes,
            } => warn!(target: "sync", attempt, remaining_minutes, "waiting before retry"),
            SyncEvent::RunCompleted {
                run_id,
                report,
                elapsed,
            } => info!(
                target: "sync",
                %run_id,
                fetched = report.fetched,
                duplicate = report.duplicate,
                inserted = report.inserted,
                elapsed_secs = elapsed.as_secs(),
                "run completed"
            ),
            SyncEvent::RunAborted { run_id, attempts } => {
                warn!(target: "sync", %run_id, attempts, "run aborted")
            }
            SyncEvent::WaitInterrupted { run_id } => {
                warn!(target: "sync", %run_id, "retry wait interrupted")
            }
        }
    }
}
