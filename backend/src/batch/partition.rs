//! Splits a closed date range into fixed-length sequential windows.
//!
//! A window is `[s, min(s + days - 1s, end)]` and the next window starts one
//! second after the previous one ends, so windows are contiguous,
//! non-overlapping and cover the range exactly. The final window is clipped
//! to `end` and may be shorter than the configured length.

use std::fmt;
use std::iter::FusedIterator;

use chrono::{NaiveDateTime, TimeDelta};

use crate::batch::model::BatchCheckpoint;
use crate::error::SyncError;
use crate::time::format_timestamp;

fn one_second() -> TimeDelta {
    TimeDelta::seconds(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} .. {}]",
            format_timestamp(&self.start),
            format_timestamp(&self.end)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPlan {
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: TimeDelta,
}

impl IntervalPlan {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval_days: i64,
    ) -> Result<Self, SyncError> {
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }

        let step = TimeDelta::try_days(interval_days)
            .filter(|_| interval_days > 0)
            .ok_or_else(|| {
                SyncError::InvalidParameter(format!(
                    "interval length must be a positive number of days, got {interval_days}"
                ))
            })?;

        Ok(Self { start, end, step })
    }

    /// Enumerates every window from the range start.
    pub fn iter(&self) -> Intervals {
        self.iter_from(Some(self.start))
    }

    /// Enumerates the windows still owed for `checkpoint`.
    ///
    /// A completed checkpoint yields nothing; an untouched one yields the
    /// whole plan; otherwise enumeration starts one second after
    /// `last_processed_end`.
    pub fn resume_from(&self, checkpoint: &BatchCheckpoint) -> Intervals {
        if checkpoint.completed {
            return self.iter_from(None);
        }
        match checkpoint.last_processed_end {
            Some(last_end) => self.iter_from(last_end.checked_add_signed(one_second())),
            None => self.iter(),
        }
    }

    pub fn total_intervals(&self) -> u64 {
        let span = (self.end - self.start).num_seconds();
        (span / self.step.num_seconds()) as u64 + 1
    }

    /// 1-based position of the window starting at `interval_start`.
    pub fn ordinal_of(&self, interval_start: NaiveDateTime) -> u64 {
        if interval_start <= self.start {
            return 1;
        }
        let offset = (interval_start - self.start).num_seconds();
        (offset / self.step.num_seconds()) as u64 + 1
    }

    fn iter_from(&self, next_start: Option<NaiveDateTime>) -> Intervals {
        Intervals {
            next_start,
            end: self.end,
            step: self.step,
        }
    }
}

impl IntoIterator for &IntervalPlan {
    type Item = Interval;
    type IntoIter = Intervals;

    fn into_iter(self) -> Intervals {
        self.iter()
    }
}

/// Lazy window sequence produced by [`IntervalPlan`].
#[derive(Debug, Clone)]
pub struct Intervals {
    next_start: Option<NaiveDateTime>,
    end: NaiveDateTime,
    step: TimeDelta,
}

impl Iterator for Intervals {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        let start = self.next_start.take()?;
        if start > self.end {
            return None;
        }

        let end = start
            .checked_add_signed(self.step)
            .and_then(|t| t.checked_sub_signed(one_second()))
            .map_or(self.end, |t| t.min(self.end));

        self.next_start = end.checked_add_signed(one_second());
        Some(Interval { start, end })
    }
}

impl FusedIterator for Intervals {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn four_day_range_with_two_day_windows_gives_three() {
        let plan = IntervalPlan::new(at("2024-01-01 00:00:00"), at("2024-01-05 00:00:00"), 2)
            .unwrap();

        let windows: Vec<_> = plan.iter().collect();
        assert_eq!(
            windows,
            vec![
                Interval {
                    start: at("2024-01-01 00:00:00"),
                    end: at("2024-01-02 23:59:59")
                },
                Interval {
                    start: at("2024-01-03 00:00:00"),
                    end: at("2024-01-04 23:59:59")
                },
                Interval {
                    start: at("2024-01-05 00:00:00"),
                    end: at("2024-01-05 00:00:00")
                },
            ]
        );
        assert_eq!(plan.total_intervals(), 3);
    }

    #[test]
    fn single_instant_range_has_one_window() {
        let t = at("2024-06-01 12:00:00");
        let plan = IntervalPlan::new(t, t, 7).unwrap();

        let windows: Vec<_> = plan.iter().collect();
        assert_eq!(windows, vec![Interval { start: t, end: t }]);
        assert_eq!(plan.total_intervals(), 1);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let a = at("2024-01-02 00:00:00");
        let b = at("2024-01-01 00:00:00");
        assert!(matches!(
            IntervalPlan::new(a, b, 1),
            Err(SyncError::InvalidRange { .. })
        ));
        assert!(matches!(
            IntervalPlan::new(b, a, 0),
            Err(SyncError::InvalidParameter(_))
        ));
    }

    #[test]
    fn plan_is_restartable() {
        let plan = IntervalPlan::new(at("2024-01-01 00:00:00"), at("2024-01-10 00:00:00"), 3)
            .unwrap();
        let first: Vec<_> = plan.iter().collect();
        let second: Vec<_> = (&plan).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn completed_checkpoint_yields_nothing() {
        let plan = IntervalPlan::new(at("2024-01-01 00:00:00"), at("2024-01-10 00:00:00"), 3)
            .unwrap();
        let mut cp = BatchCheckpoint::fresh("r");
        cp.completed = true;
        assert_eq!(plan.resume_from(&cp).count(), 0);
    }

    #[test]
    fn checkpoint_at_range_end_yields_nothing() {
        let plan = IntervalPlan::new(at("2024-01-01 00:00:00"), at("2024-01-05 00:00:00"), 2)
            .unwrap();
        let mut cp = BatchCheckpoint::fresh("r");
        cp.record(&plan.iter().last().unwrap());
        assert_eq!(plan.resume_from(&cp).count(), 0);
    }

    #[test]
    fn ordinal_counts_from_range_start() {
        let plan = IntervalPlan::new(at("2024-01-01 00:00:00"), at("2024-01-10 00:00:00"), 2)
            .unwrap();
        for (idx, window) in plan.iter().enumerate() {
            assert_eq!(plan.ordinal_of(window.start), idx as u64 + 1);
        }
    }

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    proptest! {
        #[test]
        fn windows_tile_the_range(
            start_off in 0i64..10_000_000,
            span in 0i64..40_000_000,
            days in 1i64..45,
        ) {
            let start = base() + TimeDelta::seconds(start_off);
            let end = start + TimeDelta::seconds(span);
            let plan = IntervalPlan::new(start, end, days).unwrap();
            let windows: Vec<_> = plan.iter().collect();

            prop_assert!(!windows.is_empty());
            prop_assert_eq!(windows.len() as u64, plan.total_intervals());
            prop_assert_eq!(windows[0].start, start);
            prop_assert_eq!(windows.last().unwrap().end, end);

            for w in &windows {
                prop_assert!(w.start <= w.end);
                prop_assert!(w.end - w.start < TimeDelta::days(days));
            }
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[1].start, pair[0].end + TimeDelta::seconds(1));
            }
        }

        #[test]
        fn resume_matches_truncated_fresh_run(
            span in 0i64..40_000_000,
            days in 1i64..45,
            cut in 0usize..64,
        ) {
            let start = base();
            let end = start + TimeDelta::seconds(span);
            let plan = IntervalPlan::new(start, end, days).unwrap();
            let fresh: Vec<_> = plan.iter().collect();
            let cut = cut % fresh.len();

            let mut cp = BatchCheckpoint::fresh("r");
            cp.record(&fresh[cut]);

            let resumed: Vec<_> = plan.resume_from(&cp).collect();
            prop_assert_eq!(&resumed[..], &fresh[cut + 1..]);

            if let Some(first) = resumed.first() {
                prop_assert_eq!(plan.ordinal_of(first.start), cut as u64 + 2);
            }
        }
    }
}
