use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::batch::model::{BatchRun, RetryPolicy, RunRequest, RunState};
use crate::batch::partition::Interval;
use crate::batch::progress::{ProgressReport, ProgressTracker};
use crate::batch::tracker::StateTracker;
use crate::error::SyncError;
use crate::logger::{annotate_interval, run_span};
use crate::metrics::Counters;
use crate::notify::{Notifier, SyncEvent, SyncObserver, TracingObserver};
use crate::records::store::{IngestReport, RecordStore};
use crate::source::{FetchRequest, RecordSource};

/// Totals of one successful pass over a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub intervals_processed: u64,
    pub report: IngestReport,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No run is configured or the last one reached a terminal state.
    Idle,
    /// Another trigger is still processing.
    Busy,
    Completed(RunSummary),
    Aborted { run_id: String, attempts: u32 },
}

#[derive(Debug, Clone)]
struct ActiveRun {
    run: BatchRun,
    state: RunState,
    retries: u32,
}

/// Clears the in-flight flag when a trigger or configure call returns.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives a configured run through its intervals.
///
/// At most one run is active at a time and at most one trigger processes it;
/// overlapping ticks are reported as [`TriggerOutcome::Busy`]. A failure in
/// any interval restarts the whole batch from the last checkpoint after the
/// configured wait, until the retry budget is spent and the run is aborted.
pub struct BatchOrchestrator {
    source: Arc<dyn RecordSource>,
    records: RecordStore,
    tracker: StateTracker,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn SyncObserver>,
    policy: RetryPolicy,
    default_address: String,
    counters: Counters,
    shutdown: CancellationToken,

    active: Mutex<Option<ActiveRun>>,
    in_flight: AtomicBool,
}

impl BatchOrchestrator {
    pub fn new(
        source: Arc<dyn RecordSource>,
        records: RecordStore,
        tracker: StateTracker,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
        default_address: impl Into<String>,
    ) -> Self {
        Self {
            source,
            records,
            tracker,
            notifier,
            observer: Arc::new(TracingObserver),
            policy,
            default_address: default_address.into(),
            counters: Counters::default(),
            shutdown: CancellationToken::new(),
            active: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Cancelling `token` interrupts a pending retry wait and stops
    /// processing at the next interval boundary.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn with_counters(mut self, counters: Counters) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn state(&self) -> RunState {
        self.active
            .lock()
            .as_ref()
            .map_or(RunState::Idle, |a| a.state)
    }

    pub fn current_run(&self) -> Option<BatchRun> {
        self.active.lock().as_ref().map(|a| a.run.clone())
    }

    /// Failed attempts of the active run.
    pub fn retries(&self) -> u32 {
        self.active.lock().as_ref().map_or(0, |a| a.retries)
    }

    /// Validates and registers a new run, replacing any idle previous one.
    #[instrument(skip(self, request), target = "orchestrator", fields(partition_key = %request.partition_key))]
    pub async fn configure(&self, request: &RunRequest) -> Result<BatchRun, SyncError> {
        let run = BatchRun::from_request(request, &self.default_address)?;
        let total_intervals = run.plan()?.total_intervals();

        let Some(_gate) = InFlight::enter(&self.in_flight) else {
            let busy = self
                .current_run()
                .map_or_else(|| "unknown".to_string(), |r| r.run_id);
            return Err(SyncError::RunInProgress(busy));
        };

        self.tracker
            .register(&run)
            .await
            .map_err(|e| SyncError::persistence(&run.run_id, "register run", e))?;

        let replaced = self.active.lock().replace(ActiveRun {
            run: run.clone(),
            state: RunState::Configured,
            retries: 0,
        });

        if let Some(prev) = replaced.filter(|p| p.state.is_active()) {
            info!(previous = %prev.run.run_id, "superseding unfinished run");
            if let Err(e) = self.tracker.set_state(&prev.run.run_id, RunState::Aborted).await {
                warn!(error = %e, previous = %prev.run.run_id, "failed to retire superseded run");
            }
        }

        info!(run_id = %run.run_id, total_intervals, "batch configured");
        self.observer.on_event(&SyncEvent::RunConfigured {
            run_id: run.run_id.clone(),
            total_intervals,
        });
        self.send(
            &run,
            "Batch configured",
            &format!(
                "Run {} configured: {} .. {}, {} day(s) per interval, {} interval(s), partition {}",
                run.run_id,
                run.start,
                run.end,
                run.interval_days,
                total_intervals,
                run.partition_key
            ),
        )
        .await;

        Ok(run)
    }

    /// Restores the most recent unfinished run after a restart.
    #[instrument(skip(self), target = "orchestrator")]
    pub async fn recover(&self) -> Result<Option<BatchRun>, SyncError> {
        let found = self
            .tracker
            .resumable()
            .await
            .map_err(|e| SyncError::persistence("-", "restore resumable run", e))?;

        let Some((run, state)) = found else {
            debug!("no unfinished run to restore");
            return Ok(None);
        };

        info!(run_id = %run.run_id, state = state.as_str(), "restored unfinished run");
        *self.active.lock() = Some(ActiveRun {
            run: run.clone(),
            state,
            retries: 0,
        });
        Ok(Some(run))
    }

    /// Startup sequence: resume an unfinished run if there is one, otherwise
    /// configure `initial`. A restored run takes precedence over `initial`.
    pub async fn bootstrap(
        &self,
        initial: Option<&RunRequest>,
    ) -> Result<Option<BatchRun>, SyncError> {
        if let Some(run) = self.recover().await? {
            if initial.is_some() {
                info!(run_id = %run.run_id, "unfinished run restored; ignoring startup request");
            }
            return Ok(Some(run));
        }

        match initial {
            Some(request) => self.configure(request).await.map(Some),
            None => Ok(None),
        }
    }

    /// Processes the active run to completion or abort.
    ///
    /// Returns `Err(InterruptedWait)` when shutdown cancels a retry wait and
    /// `Err(Interrupted)` when it arrives between intervals; either way the
    /// run stays resumable with its retry count untouched.
    pub async fn trigger(&self) -> Result<TriggerOutcome, SyncError> {
        let Some(_gate) = InFlight::enter(&self.in_flight) else {
            self.counters.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("previous trigger still running; skipping");
            return Ok(TriggerOutcome::Busy);
        };

        let run = {
            let active = self.active.lock();
            match active.as_ref() {
                Some(a) if a.state.is_active() => a.run.clone(),
                _ => return Ok(TriggerOutcome::Idle),
            }
        };

        let span = run_span(&run.run_id);
        self.run_with_retries(&run).instrument(span).await
    }

    /// Scheduler entry point: trigger and log the outcome.
    pub async fn on_tick(&self) {
        match self.trigger().await {
            Ok(TriggerOutcome::Idle) => debug!("no active run"),
            Ok(TriggerOutcome::Busy) => debug!("tick skipped"),
            Ok(TriggerOutcome::Completed(summary)) => {
                info!(run_id = %summary.run_id, "tick completed run")
            }
            Ok(TriggerOutcome::Aborted { run_id, attempts }) => {
                warn!(%run_id, attempts, "tick ended in abort")
            }
            Err(e) => warn!(error = %e, "tick ended early"),
        }
    }

    async fn run_with_retries(&self, run: &BatchRun) -> Result<TriggerOutcome, SyncError> {
        loop {
            self.transition(run, RunState::Running).await;

            let err = match self.process_full_batch(run).await {
                Ok(summary) => {
                    self.finish(run, &summary).await;
                    return Ok(TriggerOutcome::Completed(summary));
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            self.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
            let attempt = self.bump_retries(run);
            error!(error = %err, attempt, max_retries = self.policy.max_retries, "batch attempt failed");
            self.send(
                run,
                "Batch error",
                &format!(
                    "Attempt {attempt} of run {} failed (max retries {}): {err}",
                    run.run_id, self.policy.max_retries
                ),
            )
            .await;

            if attempt > self.policy.max_retries {
                self.transition(run, RunState::Aborted).await;
                self.observer.on_event(&SyncEvent::RunAborted {
                    run_id: run.run_id.clone(),
                    attempts: attempt,
                });
                self.send(
                    run,
                    "Batch aborted",
                    &format!(
                        "Run {} aborted after {attempt} failed attempt(s); last error: {err}",
                        run.run_id
                    ),
                )
                .await;
                return Ok(TriggerOutcome::Aborted {
                    run_id: run.run_id.clone(),
                    attempts: attempt,
                });
            }

            self.transition(run, RunState::Retrying).await;
            self.wait_before_retry(run, attempt).await?;
        }
    }

    async fn wait_before_retry(&self, run: &BatchRun, attempt: u32) -> Result<(), SyncError> {
        let mut remaining = self.policy.retry_wait;
        let step = if self.policy.wait_step.is_zero() {
            remaining
        } else {
            self.policy.wait_step
        };

        while !remaining.is_zero() {
            let remaining_minutes = remaining.as_secs().div_ceil(60);
            self.observer.on_event(&SyncEvent::RetryCountdown {
                attempt,
                remaining_minutes,
            });
            self.send(
                run,
                "Batch retry pending",
                &format!(
                    "Run {} retries in {remaining_minutes} minute(s) (attempt {attempt})",
                    run.run_id
                ),
            )
            .await;

            let nap = step.min(remaining);
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    warn!(attempt, "retry wait interrupted");
                    self.observer.on_event(&SyncEvent::WaitInterrupted {
                        run_id: run.run_id.clone(),
                    });
                    self.send(
                        run,
                        "Batch retry interrupted",
                        &format!("Retry wait for run {} was interrupted", run.run_id),
                    )
                    .await;
                    return Err(SyncError::InterruptedWait {
                        run_id: run.run_id.clone(),
                    });
                }
                _ = tokio::time::sleep(nap) => {}
            }
            remaining = remaining.saturating_sub(nap);
        }

        Ok(())
    }

    /// One pass from the checkpoint's resume point to the end of the range.
    async fn process_full_batch(&self, run: &BatchRun) -> Result<RunSummary, SyncError> {
        let plan = run.plan()?;
        let total = plan.total_intervals();

        let mut checkpoint = self
            .tracker
            .load(&run.run_id)
            .await
            .map_err(|e| SyncError::persistence(&run.run_id, "load checkpoint", e))?;

        let mut summary = RunSummary {
            run_id: run.run_id.clone(),
            intervals_processed: 0,
            report: IngestReport::default(),
            elapsed: Duration::ZERO,
        };

        if checkpoint.completed {
            info!("checkpoint already complete; nothing to do");
            return Ok(summary);
        }

        let mut pending = plan.resume_from(&checkpoint).peekable();
        let first_ordinal = pending
            .peek()
            .map_or(total + 1, |w| plan.ordinal_of(w.start));
        let mut progress = ProgressTracker::new(total, first_ordinal - 1);

        if first_ordinal > 1 {
            info!(from = first_ordinal, total, "resuming from checkpoint");
        }

        for (ordinal, window) in (first_ordinal..).zip(pending) {
            // checkpoint already covers everything before `window`
            if summary.intervals_processed > 0 && self.shutdown.is_cancelled() {
                warn!(next = ordinal, total, "shutdown requested; stopping between intervals");
                return Err(SyncError::Interrupted {
                    run_id: run.run_id.clone(),
                });
            }

            annotate_interval(ordinal, &window);
            self.observer.on_event(&SyncEvent::IntervalStarted {
                ordinal,
                total,
                interval: window,
            });

            let started = Instant::now();
            let report = self.process_interval(run, window).await?;

            checkpoint.record(&window);
            self.tracker.save(&checkpoint).await.map_err(|e| {
                SyncError::persistence(&run.run_id, format!("save checkpoint after {window}"), e)
            })?;

            self.counters.record_interval(&report);
            summary.report.absorb(&report);
            summary.intervals_processed += 1;

            self.observer.on_event(&SyncEvent::IntervalCompleted {
                ordinal,
                interval: window,
                report,
            });
            let p = progress.interval_done(started.elapsed());
            self.emit_progress(&p);

            self.send(
                run,
                "Interval processed",
                &format!(
                    "Interval {ordinal}/{total} {window}: fetched {}, invalid {}, duplicate {}, inserted {} ({}%)",
                    report.fetched, report.invalid, report.duplicate, report.inserted, p.percent
                ),
            )
            .await;
        }

        if let Some(p) = progress.finish() {
            self.emit_progress(&p);
        }

        checkpoint.completed = true;
        self.tracker
            .save(&checkpoint)
            .await
            .map_err(|e| SyncError::persistence(&run.run_id, "mark checkpoint completed", e))?;

        summary.elapsed = progress.elapsed();
        Ok(summary)
    }

    async fn process_interval(
        &self,
        run: &BatchRun,
        window: Interval,
    ) -> Result<IngestReport, SyncError> {
        let request = FetchRequest {
            limit: run.limit,
            offset: run.offset,
            partition_key: run.partition_key.clone(),
            window,
        };

        let records = self
            .source
            .fetch(&request)
            .await
            .map_err(|source| SyncError::FetchFailed {
                run_id: run.run_id.clone(),
                partition_key: run.partition_key.clone(),
                window,
                source,
            })?;

        let report = self.records.ingest(records).await.map_err(|e| {
            SyncError::persistence(
                &run.run_id,
                format!("partition {} window {window}", run.partition_key),
                e,
            )
        })?;

        info!(
            interval = %window,
            fetched = report.fetched,
            invalid = report.invalid,
            duplicate = report.duplicate,
            inserted = report.inserted,
            "interval ingested"
        );
        Ok(report)
    }

    async fn finish(&self, run: &BatchRun, summary: &RunSummary) {
        self.transition(run, RunState::Completed).await;
        if let Some(active) = self.active.lock().as_mut() {
            if active.run.run_id == run.run_id {
                active.retries = 0;
            }
        }

        self.observer.on_event(&SyncEvent::RunCompleted {
            run_id: run.run_id.clone(),
            report: summary.report,
            elapsed: summary.elapsed,
        });
        self.send(
            run,
            "Batch completed",
            &format!(
                "Run {} completed in {}s: {} interval(s), fetched {}, invalid {}, duplicate {}, inserted {}",
                run.run_id,
                summary.elapsed.as_secs(),
                summary.intervals_processed,
                summary.report.fetched,
                summary.report.invalid,
                summary.report.duplicate,
                summary.report.inserted
            ),
        )
        .await;
    }

    fn emit_progress(&self, p: &ProgressReport) {
        self.observer.on_event(&SyncEvent::Progress {
            percent: p.percent,
            eta: p.eta,
        });
    }

    fn bump_retries(&self, run: &BatchRun) -> u32 {
        let mut active = self.active.lock();
        match active.as_mut() {
            Some(a) if a.run.run_id == run.run_id => {
                a.retries += 1;
                a.retries
            }
            _ => 1,
        }
    }

    /// Updates the in-memory state and persists it; persistence failures are
    /// logged only.
    async fn transition(&self, run: &BatchRun, state: RunState) {
        if let Some(active) = self.active.lock().as_mut() {
            if active.run.run_id == run.run_id {
                active.state = state;
            }
        }
        if let Err(e) = self.tracker.set_state(&run.run_id, state).await {
            warn!(error = %e, state = state.as_str(), "failed to persist run state");
        }
    }

    async fn send(&self, run: &BatchRun, subject: &str, body: &str) {
        if let Err(e) = self
            .notifier
            .notify(&run.notify_address, subject, body)
            .await
        {
            warn!(error = %e, subject, "notification failed");
        }
    }
}
