use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::batch::model::{RetryPolicy, RunRequest};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Remote source
    // =========================
    /// Endpoint returning the `{ count, next, previous, results }` envelope.
    pub source_api_url: String,

    /// Sent as `Authorization: Token <token>`.
    pub source_api_token: String,

    /// Per-request timeout (connect + read).
    pub source_http_timeout: Duration,

    // =========================
    // Ingestion
    // =========================
    /// Maximum number of records written per insert transaction.
    ///
    /// Bounds transaction size. A failure inside a chunk rolls back that
    /// chunk only; chunks committed earlier in the same interval stay.
    pub insert_chunk_size: usize,

    // =========================
    // Retry policy
    // =========================
    /// Failed attempts tolerated before the run is aborted.
    pub max_retries: u32,

    /// Wait between a failed attempt and the full-batch restart.
    pub retry_wait_minutes: u32,

    // =========================
    // Notification
    // =========================
    /// Fallback recipient when a run is configured without one.
    pub notification_address: String,

    /// When set, notifications are POSTed here instead of only logged.
    pub notify_webhook_url: Option<String>,

    // =========================
    // Scheduler
    // =========================
    /// Cadence of the periodic trigger.
    pub scheduler_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://batchsync_dev.db?mode=rwc".to_string());

        let source_api_url = get("SOURCE_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("SOURCE_API_URL must be set"))?;
        let source_api_token = get("SOURCE_API_TOKEN").unwrap_or_default();

        let cfg = Self {
            database_url,
            source_api_url,
            source_api_token,
            source_http_timeout: Duration::from_secs(parse_or(&get, "SOURCE_HTTP_TIMEOUT_SECS", 25)?),

            insert_chunk_size: parse_or(&get, "INSERT_CHUNK_SIZE", 1_000)?,

            max_retries: parse_or(&get, "MAX_RETRIES", 3)?,
            retry_wait_minutes: parse_or(&get, "RETRY_WAIT_MINUTES", 5)?,

            notification_address: get("NOTIFICATION_ADDRESS")
                .unwrap_or_else(|| "ops@localhost".to_string()),
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL").filter(|v| !v.trim().is_empty()),

            scheduler_interval: Duration::from_secs(parse_or(&get, "SCHEDULER_INTERVAL_SECS", 180)?),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.insert_chunk_size == 0 {
            bail!("INSERT_CHUNK_SIZE must be positive");
        }
        if self.scheduler_interval.is_zero() {
            bail!("SCHEDULER_INTERVAL_SECS must be positive");
        }
        if self.source_http_timeout.is_zero() {
            bail!("SOURCE_HTTP_TIMEOUT_SECS must be positive");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_wait: Duration::from_secs(u64::from(self.retry_wait_minutes) * 60),
            ..RetryPolicy::default()
        }
    }
}

/// Reads a run submitted at startup through `SYNC_*` variables.
///
/// Returns `None` unless `SYNC_START_DATE` is present.
pub fn initial_run_from_lookup<F>(get: F) -> Result<Option<RunRequest>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(start_date) = get("SYNC_START_DATE") else {
        return Ok(None);
    };
    let end_date = get("SYNC_END_DATE")
        .ok_or_else(|| anyhow!("SYNC_END_DATE must be set together with SYNC_START_DATE"))?;

    Ok(Some(RunRequest {
        start_date,
        end_date,
        interval_days: parse_or(&get, "SYNC_INTERVAL_DAYS", 14)?,
        limit: parse_or(&get, "SYNC_LIMIT", 999_999)?,
        offset: parse_or(&get, "SYNC_OFFSET", 1)?,
        partition_key: get("SYNC_PORTFOLIO").unwrap_or_else(|| "04".to_string()),
        notify_address: get("SYNC_NOTIFY_ADDRESS"),
    }))
}

pub fn initial_run_from_env() -> Result<Option<RunRequest>> {
    initial_run_from_lookup(|key| std::env::var(key).ok())
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
