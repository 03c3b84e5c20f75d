use std::time::{Duration, Instant};

/// Snapshot emitted at an interval boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    pub completed: u64,
    pub total: u64,
    pub percent: u8,
    /// Mean observed interval duration × intervals left.
    pub eta: Option<Duration>,
}

/// Tracks interval completion for one trigger of a run.
///
/// `completed` starts at the number of intervals already done before a
/// resume, so percentages stay relative to the whole range. 100 is
/// reported exactly once, either by the last interval or by `finish`.
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    completed: u64,
    sampled: u32,
    sampled_time: Duration,
    full_reported: bool,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: u64, already_completed: u64) -> Self {
        Self {
            total,
            completed: already_completed.min(total),
            sampled: 0,
            sampled_time: Duration::ZERO,
            full_reported: false,
            started: Instant::now(),
        }
    }

    pub fn interval_done(&mut self, took: Duration) -> ProgressReport {
        self.completed = (self.completed + 1).min(self.total);
        self.sampled = self.sampled.saturating_add(1);
        self.sampled_time += took;

        let report = self.snapshot();
        if report.percent == 100 {
            self.full_reported = true;
        }
        report
    }

    /// Forces the 100% report if no interval boundary produced it.
    pub fn finish(&mut self) -> Option<ProgressReport> {
        if self.full_reported {
            return None;
        }
        self.full_reported = true;
        self.completed = self.total;

        Some(ProgressReport {
            completed: self.total,
            total: self.total,
            percent: 100,
            eta: Some(Duration::ZERO),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.sampled == 0 {
            return None;
        }
        let mean = self.sampled_time / self.sampled;
        let left = u32::try_from(self.total - self.completed).unwrap_or(u32::MAX);
        Some(mean.saturating_mul(left))
    }

    fn snapshot(&self) -> ProgressReport {
        let percent = if self.total == 0 {
            100
        } else {
            (self.completed * 100 / self.total) as u8
        };

        ProgressReport {
            completed: self.completed,
            total: self.total,
            percent,
            eta: self.estimated_remaining(),
        }
    }
}
