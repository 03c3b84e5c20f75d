use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::records::store::IngestReport;

/// Minimal counters for operational visibility.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub intervals_processed: Arc<AtomicU64>,
    pub failed_attempts: Arc<AtomicU64>,
    pub ticks_skipped: Arc<AtomicU64>,

    // record outcomes
    pub records_fetched: Arc<AtomicU64>,
    pub records_invalid: Arc<AtomicU64>,
    pub records_duplicate: Arc<AtomicU64>,
    pub records_inserted: Arc<AtomicU64>,
}

impl Counters {
    pub fn record_interval(&self, report: &IngestReport) {
        self.intervals_processed.fetch_add(1, Ordering::Relaxed);
        self.records_fetched
            .fetch_add(report.fetched as u64, Ordering::Relaxed);
        self.records_invalid
            .fetch_add(report.invalid as u64, Ordering::Relaxed);
        self.records_duplicate
            .fetch_add(report.duplicate as u64, Ordering::Relaxed);
        self.records_inserted
            .fetch_add(report.inserted as u64, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
