use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Ingested records; the identity column is the dedup key.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS interactions (
  interaction_id BIGINT PRIMARY KEY,
  remote_id BIGINT,
  company TEXT,
  campaign TEXT,
  base_segment TEXT,
  strategy TEXT,
  channel_type TEXT,
  dial_type TEXT,
  contact_code TEXT,
  contact TEXT,
  contact_created_at TEXT,
  contact_updated_at TEXT,
  product_code TEXT,
  phone TEXT,
  contact_group TEXT,
  group_code TEXT,
  result TEXT,
  result_code TEXT,
  reason TEXT,
  reason_code TEXT,
  sub_reason TEXT,
  sub_reason_code TEXT,
  classification_comment TEXT,
  atk_result TEXT,
  zip_code TEXT,
  ticket_assigned_at TEXT,
  classified_at TEXT,
  ticket_resolved_at TEXT,
  promise_date TEXT,
  promise_amount REAL,
  scheduled_for TEXT,
  agent_id BIGINT,
  agent_name TEXT,
  agent_extension TEXT,
  call_id TEXT,
  ticket_id BIGINT,
  synced_at TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // Configured runs
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS batch_runs (
  run_id TEXT PRIMARY KEY,
  start_at TEXT NOT NULL,
  end_at TEXT NOT NULL,
  interval_days BIGINT NOT NULL,
  page_limit BIGINT NOT NULL,
  page_offset BIGINT NOT NULL,
  partition_key TEXT NOT NULL,
  notify_address TEXT NOT NULL,
  state TEXT NOT NULL,
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Resume trail, one row per run
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS batch_checkpoints (
  run_id TEXT PRIMARY KEY,
  last_processed_start TEXT,
  last_processed_end TEXT,
  completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0,1))
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_batch_runs_state ON batch_runs(state);"#)
        .execute(pool)
        .await?;

    Ok(())
}
