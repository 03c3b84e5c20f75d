use std::time::Duration;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::batch::partition::{Interval, IntervalPlan};
use crate::error::SyncError;
use crate::time::{now_ms, parse_timestamp};

/// Parameters submitted by the control surface to configure a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// `yyyy-MM-dd HH:mm:ss`
    pub start_date: String,
    /// `yyyy-MM-dd HH:mm:ss`, inclusive
    pub end_date: String,
    pub interval_days: i64,
    pub limit: u32,
    pub offset: u32,
    pub partition_key: String,
    pub notify_address: Option<String>,
}

/// One configured synchronization job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRun {
    pub run_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval_days: u32,
    /// Passed through to the remote source unchanged.
    pub limit: u32,
    pub offset: u32,
    pub partition_key: String,
    pub notify_address: String,
    pub created_ms: u64,
}

impl BatchRun {
    /// Validates `request` and assigns a fresh run identity.
    pub fn from_request(request: &RunRequest, default_address: &str) -> Result<Self, SyncError> {
        let start = parse_date("start_date", &request.start_date)?;
        let end = parse_date("end_date", &request.end_date)?;

        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }

        let interval_days = u32::try_from(request.interval_days)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                SyncError::InvalidParameter(format!(
                    "interval_days must be a positive number of days, got {}",
                    request.interval_days
                ))
            })?;

        if request.partition_key.trim().is_empty() {
            return Err(SyncError::InvalidParameter(
                "partition key must not be empty".into(),
            ));
        }

        let notify_address = request
            .notify_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(default_address)
            .to_string();

        let run = Self {
            run_id: Uuid::new_v4().to_string(),
            start,
            end,
            interval_days,
            limit: request.limit,
            offset: request.offset,
            partition_key: request.partition_key.trim().to_string(),
            notify_address,
            created_ms: now_ms(),
        };

        run.plan()?;
        Ok(run)
    }

    pub fn plan(&self) -> Result<IntervalPlan, SyncError> {
        IntervalPlan::new(self.start, self.end, i64::from(self.interval_days))
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDateTime, SyncError> {
    parse_timestamp(raw).map_err(|e| {
        SyncError::InvalidParameter(format!(
            "{field} {raw:?} is not yyyy-MM-dd HH:mm:ss: {e}"
        ))
    })
}

/// Lifecycle of a run as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Configured,
    Running,
    Retrying,
    Completed,
    Aborted,
}

impl RunState {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Configured => "configured",
            RunState::Running => "running",
            RunState::Retrying => "retrying",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "idle" => Some(RunState::Idle),
            "configured" => Some(RunState::Configured),
            "running" => Some(RunState::Running),
            "retrying" => Some(RunState::Retrying),
            "completed" => Some(RunState::Completed),
            "aborted" => Some(RunState::Aborted),
            _ => None,
        }
    }

    /// A run in one of these states is picked up by triggers and ticks.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Configured | RunState::Running | RunState::Retrying
        )
    }
}

/// Durable resume marker, one per run identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCheckpoint {
    pub run_id: String,
    pub last_processed_start: Option<NaiveDateTime>,
    pub last_processed_end: Option<NaiveDateTime>,
    pub completed: bool,
}

impl BatchCheckpoint {
    pub fn fresh(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            last_processed_start: None,
            last_processed_end: None,
            completed: false,
        }
    }

    pub fn record(&mut self, interval: &Interval) {
        self.last_processed_start = Some(interval.start);
        self.last_processed_end = Some(interval.end);
    }
}

/// Full-batch retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts tolerated; the next failure aborts the run.
    pub max_retries: u32,
    /// Total wait before restarting from the checkpoint.
    pub retry_wait: Duration,
    /// Granularity of the countdown while waiting.
    pub wait_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_wait: Duration::from_secs(5 * 60),
            wait_step: Duration::from_secs(60),
        }
    }
}
