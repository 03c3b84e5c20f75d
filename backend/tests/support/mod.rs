#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use batchsync::{
    batch::{
        BatchCheckpoint, BatchOrchestrator, BatchRun, Interval, RetryPolicy, RunRequest, RunState,
        repository::BatchStateRepository, tracker::StateTracker,
    },
    notify::{Notifier, SyncEvent, SyncObserver},
    records::{IdentityKey, StoredRecord, repository::RecordRepository, store::RecordStore},
    source::{FetchRequest, RecordSource, SourceError, SourceRecord},
    time::parse_timestamp,
};

// -----------------------
// Source
// -----------------------

/// Replays queued pages in call order; an empty queue yields empty pages.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<VecDeque<Result<Vec<SourceRecord>, SourceError>>>,
    pub fail_all: AtomicBool,
    pub requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedSource {
    pub fn push_page(&self, page: Vec<SourceRecord>) {
        self.pages.lock().push_back(Ok(page));
    }

    pub fn push_failure(&self) {
        self.pages.lock().push_back(Err(unavailable()));
    }

    pub fn windows(&self) -> Vec<Interval> {
        self.requests.lock().iter().map(|r| r.window).collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<SourceRecord>, SourceError> {
        self.requests.lock().push(request.clone());
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.pages.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

fn unavailable() -> SourceError {
    SourceError::Status {
        status: 503,
        body: "service unavailable".into(),
    }
}

pub fn record(id: i64) -> SourceRecord {
    SourceRecord {
        interaction_id: Some(id),
        classified_at: Some("2024-01-01T09:30:00".into()),
        contact: Some(format!("contact-{id}")),
        ..Default::default()
    }
}

// -----------------------
// Persistence
// -----------------------

#[derive(Default)]
pub struct MemoryRecordRepo {
    pub stored: Mutex<HashMap<IdentityKey, StoredRecord>>,
}

impl MemoryRecordRepo {
    pub fn ids(&self) -> HashSet<IdentityKey> {
        self.stored.lock().keys().copied().collect()
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepo {
    async fn exists(&self, key: IdentityKey) -> anyhow::Result<bool> {
        Ok(self.stored.lock().contains_key(&key))
    }

    async fn insert_batch(&self, records: &[StoredRecord]) -> anyhow::Result<()> {
        let mut stored = self.stored.lock();
        for r in records {
            stored.insert(r.interaction_id, r.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateRepo {
    pub checkpoints: Mutex<HashMap<String, BatchCheckpoint>>,
    pub runs: Mutex<Vec<(BatchRun, RunState)>>,
}

impl MemoryStateRepo {
    pub fn run_state(&self, run_id: &str) -> Option<RunState> {
        self.runs
            .lock()
            .iter()
            .find(|(r, _)| r.run_id == run_id)
            .map(|(_, s)| *s)
    }

    pub fn checkpoint(&self, run_id: &str) -> Option<BatchCheckpoint> {
        self.checkpoints.lock().get(run_id).cloned()
    }
}

#[async_trait]
impl BatchStateRepository for MemoryStateRepo {
    async fn load_checkpoint(&self, run_id: &str) -> anyhow::Result<Option<BatchCheckpoint>> {
        Ok(self.checkpoints.lock().get(run_id).cloned())
    }

    async fn save_checkpoint(&self, cp: &BatchCheckpoint) -> anyhow::Result<()> {
        self.checkpoints
            .lock()
            .insert(cp.run_id.clone(), cp.clone());
        Ok(())
    }

    async fn save_run(&self, run: &BatchRun, state: RunState) -> anyhow::Result<()> {
        self.runs.lock().push((run.clone(), state));
        Ok(())
    }

    async fn update_run_state(&self, run_id: &str, state: RunState) -> anyhow::Result<()> {
        let mut runs = self.runs.lock();
        let entry = runs
            .iter_mut()
            .find(|(r, _)| r.run_id == run_id)
            .ok_or_else(|| anyhow::anyhow!("no batch run with id {run_id}"))?;
        entry.1 = state;
        Ok(())
    }

    async fn latest_active_run(&self) -> anyhow::Result<Option<(BatchRun, RunState)>> {
        Ok(self
            .runs
            .lock()
            .iter()
            .filter(|(_, s)| s.is_active())
            .max_by_key(|(r, _)| r.created_ms)
            .cloned())
    }
}

// -----------------------
// Notification + events
// -----------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        if self.fail {
            anyhow::bail!("smtp relay refused connection");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    pub fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    pub fn started_ordinals(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SyncEvent::IntervalStarted { ordinal, .. } => Some(*ordinal),
                _ => None,
            })
            .collect()
    }

    pub fn countdown(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SyncEvent::RetryCountdown {
                    remaining_minutes, ..
                } => Some(*remaining_minutes),
                _ => None,
            })
            .collect()
    }

    pub fn saw(&self, pred: impl Fn(&SyncEvent) -> bool) -> bool {
        self.events.lock().iter().any(pred)
    }
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        self.events.lock().push(event.clone());
    }
}

// -----------------------
// Harness
// -----------------------

pub struct Harness {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub records: Arc<MemoryRecordRepo>,
    pub state: Arc<MemoryStateRepo>,
    pub notifier: Arc<RecordingNotifier>,
    pub observer: Arc<RecordingObserver>,
    pub shutdown: CancellationToken,
}

pub struct HarnessBuilder {
    policy: RetryPolicy,
    records: Arc<MemoryRecordRepo>,
    state: Arc<MemoryStateRepo>,
    notifier: Arc<RecordingNotifier>,
    shutdown: CancellationToken,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            policy: fast_policy(3),
            records: Arc::default(),
            state: Arc::default(),
            notifier: Arc::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Reuse the persistence of an earlier harness, as after a restart.
    pub fn sharing(mut self, other: &Harness) -> Self {
        self.records = other.records.clone();
        self.state = other.state.clone();
        self
    }

    pub fn build(self, source: Arc<dyn RecordSource>) -> Harness {
        let observer = Arc::new(RecordingObserver::default());
        let shutdown = self.shutdown;

        let orchestrator = BatchOrchestrator::new(
            source,
            RecordStore::new(self.records.clone(), 1000),
            StateTracker::new(self.state.clone()),
            self.notifier.clone(),
            self.policy,
            "ops@test",
        )
        .with_observer(observer.clone())
        .with_shutdown(shutdown.clone());

        Harness {
            orchestrator: Arc::new(orchestrator),
            records: self.records,
            state: self.state,
            notifier: self.notifier,
            observer,
            shutdown,
        }
    }
}

pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_wait: Duration::from_secs(120),
        wait_step: Duration::from_secs(60),
    }
}

pub fn request(start: &str, end: &str, days: i64) -> RunRequest {
    RunRequest {
        start_date: start.into(),
        end_date: end.into(),
        interval_days: days,
        limit: 999_999,
        offset: 1,
        partition_key: "04".into(),
        notify_address: Some("lead@test".into()),
    }
}

pub fn window(start: &str, end: &str) -> Interval {
    Interval {
        start: parse_timestamp(start).unwrap(),
        end: parse_timestamp(end).unwrap(),
    }
}

/// The three windows of 2024-01-01 .. 2024-01-05 at two days each.
pub fn three_windows() -> Vec<Interval> {
    vec![
        window("2024-01-01 00:00:00", "2024-01-02 23:59:59"),
        window("2024-01-03 00:00:00", "2024-01-04 23:59:59"),
        window("2024-01-05 00:00:00", "2024-01-05 00:00:00"),
    ]
}

// -----------------------
// SQLite
// -----------------------

/// Isolated in-memory DB per test, migrated with the production schema.
/// `cache=shared` lets every connection in the pool see the same database.
pub async fn setup_db() -> batchsync::db::Db {
    sqlx::any::install_default_drivers();

    let name = uuid::Uuid::new_v4().to_string();
    let db = batchsync::db::Db::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite memory db");
    db.migrate().await.expect("migrate");
    db
}
