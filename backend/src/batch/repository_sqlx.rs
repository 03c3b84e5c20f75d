use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{AnyPool, Row};

use crate::batch::model::{BatchCheckpoint, BatchRun, RunState};
use crate::batch::repository::BatchStateRepository;
use crate::time::{format_timestamp, parse_timestamp};

/// SQLx-backed implementation of BatchStateRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxBatchStateRepository {
    pool: AnyPool,
}

impl SqlxBatchStateRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStateRepository for SqlxBatchStateRepository {
    async fn load_checkpoint(&self, run_id: &str) -> anyhow::Result<Option<BatchCheckpoint>> {
        let row = sqlx::query(
            r#"
SELECT run_id, last_processed_start, last_processed_end, completed
FROM batch_checkpoints
WHERE run_id = ?;
"#,
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_checkpoint(&r)?)),
            None => Ok(None),
        }
    }

    async fn save_checkpoint(&self, checkpoint: &BatchCheckpoint) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO batch_checkpoints (run_id, last_processed_start, last_processed_end, completed)
VALUES (?, ?, ?, ?)
ON CONFLICT (run_id) DO UPDATE SET
  last_processed_start = excluded.last_processed_start,
  last_processed_end = excluded.last_processed_end,
  completed = excluded.completed;
"#,
        )
        .bind(checkpoint.run_id.clone())
        .bind(checkpoint.last_processed_start.as_ref().map(format_timestamp))
        .bind(checkpoint.last_processed_end.as_ref().map(format_timestamp))
        .bind(i64::from(checkpoint.completed))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_run(&self, run: &BatchRun, state: RunState) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO batch_runs (
  run_id, start_at, end_at, interval_days, page_limit, page_offset,
  partition_key, notify_address, state, created_ms
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(run.run_id.clone())
        .bind(format_timestamp(&run.start))
        .bind(format_timestamp(&run.end))
        .bind(i64::from(run.interval_days))
        .bind(i64::from(run.limit))
        .bind(i64::from(run.offset))
        .bind(run.partition_key.clone())
        .bind(run.notify_address.clone())
        .bind(state.as_str())
        .bind(u64_to_i64(run.created_ms)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_run_state(&self, run_id: &str, state: RunState) -> anyhow::Result<()> {
        let res = sqlx::query(r#"UPDATE batch_runs SET state = ? WHERE run_id = ?;"#)
            .bind(state.as_str())
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(anyhow!("no batch run with id {run_id}"));
        }
        Ok(())
    }

    async fn latest_active_run(&self) -> anyhow::Result<Option<(BatchRun, RunState)>> {
        let rows = sqlx::query(
            r#"
SELECT
  run_id, start_at, end_at, interval_days, page_limit, page_offset,
  partition_key, notify_address, state, created_ms
FROM batch_runs
WHERE state IN ('configured', 'running', 'retrying')
ORDER BY created_ms DESC;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        for r in rows {
            match row_to_run(&r) {
                Ok(found) => return Ok(Some(found)),
                Err(e) => {
                    // poison-row resilience: skip but keep looking
                    tracing::warn!(error = %e, "skipping malformed batch run row");
                }
            }
        }

        Ok(None)
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_checkpoint(r: &sqlx::any::AnyRow) -> anyhow::Result<BatchCheckpoint> {
    let completed: i64 = r.get("completed");

    Ok(BatchCheckpoint {
        run_id: r.get::<String, _>("run_id"),
        last_processed_start: opt_ts(r.get("last_processed_start"))
            .context("invalid last_processed_start")?,
        last_processed_end: opt_ts(r.get("last_processed_end"))
            .context("invalid last_processed_end")?,
        completed: completed == 1,
    })
}

fn row_to_run(r: &sqlx::any::AnyRow) -> anyhow::Result<(BatchRun, RunState)> {
    let run_id: String = r.get("run_id");
    let state_str: String = r.get("state");
    let state = RunState::parse(&state_str)
        .ok_or_else(|| anyhow!("unknown run state {state_str:?} for {run_id}"))?;

    let run = BatchRun {
        start: parse_timestamp(&r.get::<String, _>("start_at")).context("invalid start_at")?,
        end: parse_timestamp(&r.get::<String, _>("end_at")).context("invalid end_at")?,
        interval_days: i64_to_u32(r.get("interval_days"))?,
        limit: i64_to_u32(r.get("page_limit"))?,
        offset: i64_to_u32(r.get("page_offset"))?,
        partition_key: r.get("partition_key"),
        notify_address: r.get("notify_address"),
        created_ms: i64_to_u64(r.get("created_ms"))?,
        run_id,
    };

    Ok((run, state))
}

fn opt_ts(raw: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_timestamp(&s).map_err(|e| anyhow!("{s:?}: {e}")))
        .transpose()
}

/* =========================
Numeric safety helpers
========================= */

fn i64_to_u32(v: i64) -> anyhow::Result<u32> {
    if v < 0 || v > u32::MAX as i64 {
        return Err(anyhow!("out of range for u32: {v}"));
    }
    Ok(v as u32)
}

fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    if v < 0 {
        return Err(anyhow!("negative i64 where u64 expected: {v}"));
    }
    Ok(v as u64)
}

fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    if v > i64::MAX as u64 {
        return Err(anyhow!("u64 too large for i64: {v}"));
    }
    Ok(v as i64)
}
