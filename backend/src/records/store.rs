use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::logger::warn_if_slow;
use crate::records::mapper::map_record;
use crate::records::model::StoredRecord;
use crate::records::repository::RecordRepository;
use crate::source::SourceRecord;

/// Outcome of ingesting one fetched page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub invalid: usize,
    pub duplicate: usize,
    pub inserted: usize,
}

impl IngestReport {
    pub fn absorb(&mut self, other: &IngestReport) {
        self.fetched += other.fetched;
        self.invalid += other.invalid;
        self.duplicate += other.duplicate;
        self.inserted += other.inserted;
    }
}

/// Dedup-on-insert front for the record repository.
///
/// Drops invalid records, filters identities already stored (or repeated
/// inside the same page), then writes the rest in bounded chunks.
pub struct RecordStore {
    repo: Arc<dyn RecordRepository>,
    chunk_size: usize,
}

impl RecordStore {
    pub fn new(repo: Arc<dyn RecordRepository>, chunk_size: usize) -> Self {
        Self {
            repo,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[instrument(skip(self, records), target = "store", fields(fetched = records.len()))]
    pub async fn ingest(&self, records: Vec<SourceRecord>) -> Result<IngestReport> {
        let mut report = IngestReport {
            fetched: records.len(),
            ..IngestReport::default()
        };

        if records.is_empty() {
            debug!("nothing to ingest");
            return Ok(report);
        }

        let fresh = self.filter_new(records, &mut report).await?;

        if fresh.is_empty() {
            info!(
                invalid = report.invalid,
                duplicate = report.duplicate,
                "no new records to store"
            );
            return Ok(report);
        }

        let total_chunks = fresh.len().div_ceil(self.chunk_size);

        for (idx, chunk) in fresh.chunks(self.chunk_size).enumerate() {
            warn_if_slow("db_insert_batch", Duration::from_millis(500), async {
                self.repo.insert_batch(chunk).await
            })
            .await
            .with_context(|| {
                format!(
                    "insert chunk {}/{} ({} records) failed",
                    idx + 1,
                    total_chunks,
                    chunk.len()
                )
            })?;

            report.inserted += chunk.len();
            debug!(
                chunk = idx + 1,
                total_chunks,
                size = chunk.len(),
                "chunk committed"
            );
        }

        info!(
            inserted = report.inserted,
            invalid = report.invalid,
            duplicate = report.duplicate,
            "records stored"
        );
        Ok(report)
    }

    async fn filter_new(
        &self,
        records: Vec<SourceRecord>,
        report: &mut IngestReport,
    ) -> Result<Vec<StoredRecord>> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut fresh = Vec::with_capacity(records.len());

        for record in records {
            let Some(stored) = map_record(record) else {
                report.invalid += 1;
                continue;
            };

            if !seen.insert(stored.interaction_id) {
                debug!(interaction_id = stored.interaction_id, "repeated within page");
                report.duplicate += 1;
                continue;
            }

            let key = stored.interaction_id;
            let exists = warn_if_slow("db_exists", Duration::from_millis(50), async {
                self.repo.exists(key).await
            })
            .await
            .with_context(|| format!("dedup lookup failed for interaction_id={key}"))?;

            if exists {
                debug!(interaction_id = key, "already stored");
                report.duplicate += 1;
                continue;
            }

            fresh.push(stored);
        }

        Ok(fresh)
    }
}
