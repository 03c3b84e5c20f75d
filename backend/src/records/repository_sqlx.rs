use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyPool};

use crate::records::model::{IdentityKey, StoredRecord};
use crate::records::repository::RecordRepository;
use crate::time::format_timestamp;

const INSERT_RECORD: &str = r#"
INSERT INTO interactions (
  interaction_id, remote_id,
  company, campaign, base_segment, strategy, channel_type, dial_type,
  contact_code, contact, contact_created_at, contact_updated_at, product_code, phone,
  contact_group, group_code, result, result_code, reason, reason_code,
  sub_reason, sub_reason_code, classification_comment, atk_result, zip_code,
  ticket_assigned_at, classified_at, ticket_resolved_at,
  promise_date, promise_amount, scheduled_for,
  agent_id, agent_name, agent_extension, call_id, ticket_id, synced_at
) VALUES (
  ?, ?,
  ?, ?, ?, ?, ?, ?,
  ?, ?, ?, ?, ?, ?,
  ?, ?, ?, ?, ?, ?,
  ?, ?, ?, ?, ?,
  ?, ?, ?,
  ?, ?, ?,
  ?, ?, ?, ?, ?, ?
);
"#;

/// SQLx-backed implementation of RecordRepository.
/// Plain INSERT: a second row with the same identity violates the primary key.
pub struct SqlxRecordRepository {
    pool: AnyPool,
}

impl SqlxRecordRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository for SqlxRecordRepository {
    async fn exists(&self, key: IdentityKey) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 AS hit FROM interactions WHERE interaction_id = ?;")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn insert_batch(&self, records: &[StoredRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for r in records {
            bind_record(sqlx::query(INSERT_RECORD), r)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert interaction_id={}", r.interaction_id))?;
        }

        tx.commit().await.context("commit insert chunk")?;
        Ok(())
    }
}

/* =========================
Row binding
========================= */

fn bind_record<'q>(
    q: Query<'q, Any, AnyArguments<'q>>,
    r: &StoredRecord,
) -> Query<'q, Any, AnyArguments<'q>> {
    q.bind(r.interaction_id)
        .bind(r.remote_id)
        .bind(r.company.clone())
        .bind(r.campaign.clone())
        .bind(r.base_segment.clone())
        .bind(r.strategy.clone())
        .bind(r.channel_type.clone())
        .bind(r.dial_type.clone())
        .bind(r.contact_code.clone())
        .bind(r.contact.clone())
        .bind(ts_text(r.contact_created_at))
        .bind(ts_text(r.contact_updated_at))
        .bind(r.product_code.clone())
        .bind(r.phone.clone())
        .bind(r.contact_group.clone())
        .bind(r.group_code.clone())
        .bind(r.result.clone())
        .bind(r.result_code.clone())
        .bind(r.reason.clone())
        .bind(r.reason_code.clone())
        .bind(r.sub_reason.clone())
        .bind(r.sub_reason_code.clone())
        .bind(r.classification_comment.clone())
        .bind(r.atk_result.clone())
        .bind(r.zip_code.clone())
        .bind(ts_text(r.ticket_assigned_at))
        .bind(ts_text(r.classified_at))
        .bind(ts_text(r.ticket_resolved_at))
        .bind(r.promise_date.clone())
        .bind(r.promise_amount)
        .bind(r.scheduled_for.clone())
        .bind(r.agent_id)
        .bind(r.agent_name.clone())
        .bind(r.agent_extension.clone())
        .bind(r.call_id.clone())
        .bind(r.ticket_id)
        .bind(ts_text(r.synced_at))
}

fn ts_text(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(format_timestamp)
}
