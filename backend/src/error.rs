use chrono::NaiveDateTime;
use thiserror::Error;

use crate::batch::partition::Interval;
use crate::source::SourceError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("fetch failed for run {run_id} (partition {partition_key}, window {window}): {source}")]
    FetchFailed {
        run_id: String,
        partition_key: String,
        window: Interval,
        #[source]
        source: SourceError,
    },

    #[error("persistence failed for run {run_id} ({context}): {source}")]
    PersistenceFailed {
        run_id: String,
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("retry wait interrupted for run {run_id}")]
    InterruptedWait { run_id: String },

    #[error("processing of run {run_id} stopped by shutdown")]
    Interrupted { run_id: String },

    #[error("run {0} is already being processed")]
    RunInProgress(String),
}

impl SyncError {
    pub fn persistence(run_id: &str, context: impl Into<String>, err: anyhow::Error) -> Self {
        Self::PersistenceFailed {
            run_id: run_id.to_string(),
            context: context.into(),
            source: err.into(),
        }
    }

    /// Failures that feed the full-batch retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. } | Self::PersistenceFailed { .. }
        )
    }
}
