use chrono::{DateTime, TimeDelta, Utc};
use runtally_core::{AppError, AppResult};

/// Longest look-back span accepted for one run (interval multiplied by count).
pub const MAX_WINDOW_SPAN_SECS: u64 = 366 * 86_400;

const ONE_DAY: TimeDelta = TimeDelta::days(1);

/// Half-open `[start, end)` time window evaluated by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a validated window where `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::Validation(format!(
                "window start {start} must be before window end {end}"
            )));
        }

        Ok(Self { start, end })
    }

    /// Returns the inclusive window start.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the exclusive window end.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns true when `timestamp` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Validated interval/count/round parameters for the window calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    interval: TimeDelta,
    span: TimeDelta,
    round: bool,
}

/// Window plus the lower bound used to scope upstream queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    /// Window whose completed events are counted.
    pub window: TimeWindow,
    /// Earliest creation time requested upstream.
    pub lookback: DateTime<Utc>,
}

impl WindowParams {
    /// Validates window parameters.
    pub fn new(interval_secs: u64, count: u64, round: bool) -> AppResult<Self> {
        if interval_secs == 0 {
            return Err(AppError::Configuration(
                "interval must be greater than zero seconds".to_owned(),
            ));
        }

        if count == 0 {
            return Err(AppError::Configuration(
                "number of intervals must be at least one".to_owned(),
            ));
        }

        let span_secs = interval_secs
            .checked_mul(count)
            .filter(|span| *span <= MAX_WINDOW_SPAN_SECS)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "interval {interval_secs}s x {count} exceeds the maximum span of {MAX_WINDOW_SPAN_SECS}s"
                ))
            })?;

        // Both values are bounded by MAX_WINDOW_SPAN_SECS, far inside i64.
        let interval = TimeDelta::seconds(i64::try_from(interval_secs).unwrap_or(i64::MAX));
        let span = TimeDelta::seconds(i64::try_from(span_secs).unwrap_or(i64::MAX));

        Ok(Self {
            interval,
            span,
            round,
        })
    }

    /// Computes the window and lookback bound relative to `now`.
    ///
    /// `now` is truncated to whole seconds. With rounding the window end is
    /// snapped down to the previous interval boundary since the epoch. The
    /// lookback bound is the earlier of one day before `now` and
    /// `start - max_event_duration`, so events that started before the window
    /// and completed inside it are still returned upstream.
    #[must_use]
    pub fn compute(&self, now: DateTime<Utc>, max_event_duration: TimeDelta) -> WindowPlan {
        let now = now - TimeDelta::nanoseconds(i64::from(now.timestamp_subsec_nanos()));

        let end = if self.round {
            let overshoot = now.timestamp().rem_euclid(self.interval.num_seconds());
            now - TimeDelta::seconds(overshoot)
        } else {
            now
        };
        let start = end - self.span;
        let lookback = (now - ONE_DAY).min(start - max_event_duration.abs());

        WindowPlan {
            window: TimeWindow { start, end },
            lookback,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use proptest::prelude::*;

    use super::{TimeWindow, WindowParams};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, hour, minute, second)
            .single()
            .unwrap_or_else(|| unreachable!())
    }

    #[test]
    fn window_params_reject_zero_interval() {
        assert!(WindowParams::new(0, 1, false).is_err());
    }

    #[test]
    fn window_params_reject_zero_count() {
        assert!(WindowParams::new(3600, 0, true).is_err());
    }

    #[test]
    fn window_params_reject_overflowing_span() {
        assert!(WindowParams::new(u64::MAX, 2, false).is_err());
    }

    #[test]
    fn rounded_hourly_window_snaps_to_previous_boundary() {
        let params = WindowParams::new(3600, 1, true).unwrap_or_else(|_| unreachable!());
        let plan = params.compute(at(14, 23, 0), TimeDelta::seconds(60));

        assert_eq!(plan.window.start(), at(13, 0, 0));
        assert_eq!(plan.window.end(), at(14, 0, 0));
        assert!(plan.window.contains(at(13, 59, 59)));
        assert!(!plan.window.contains(at(14, 0, 0)));
        assert!(!plan.window.contains(at(12, 59, 59)));
    }

    #[test]
    fn unrounded_window_ends_at_now_truncated_to_seconds() {
        let params = WindowParams::new(600, 3, false).unwrap_or_else(|_| unreachable!());
        let now = at(14, 23, 7) + TimeDelta::milliseconds(750);
        let plan = params.compute(now, TimeDelta::zero());

        assert_eq!(plan.window.end(), at(14, 23, 7));
        assert_eq!(plan.window.start(), at(13, 53, 7));
    }

    #[test]
    fn lookback_is_never_later_than_one_day_ago() {
        let params = WindowParams::new(3600, 1, true).unwrap_or_else(|_| unreachable!());
        let plan = params.compute(at(14, 23, 0), TimeDelta::seconds(60));

        assert_eq!(plan.lookback, at(14, 23, 0) - TimeDelta::days(1));
    }

    #[test]
    fn lookback_covers_long_running_events() {
        let params = WindowParams::new(3600, 1, true).unwrap_or_else(|_| unreachable!());
        let plan = params.compute(at(14, 23, 0), TimeDelta::seconds(216_000));

        assert_eq!(plan.lookback, at(13, 0, 0) - TimeDelta::seconds(216_000));
    }

    #[test]
    fn time_window_rejects_empty_range() {
        assert!(TimeWindow::new(at(13, 0, 0), at(13, 0, 0)).is_err());
        assert!(TimeWindow::new(at(13, 0, 0), at(14, 0, 0)).is_ok());
    }

    proptest! {
        #[test]
        fn computed_windows_are_ordered_and_bounded(
            now_secs in 0_i64..4_000_000_000,
            interval in 1_u64..=86_400,
            count in 1_u64..=48,
            round in any::<bool>(),
            max_duration in 0_i64..=300_000,
        ) {
            let params = WindowParams::new(interval, count, round);
            prop_assert!(params.is_ok());
            let params = params.unwrap_or_else(|_| unreachable!());
            let now = DateTime::from_timestamp(now_secs, 0).unwrap_or_default();
            let plan = params.compute(now, TimeDelta::seconds(max_duration));

            prop_assert!(plan.window.start() < plan.window.end());
            prop_assert!(plan.window.end() <= now);
            prop_assert!(plan.lookback <= plan.window.start());
            prop_assert!(plan.lookback <= now - TimeDelta::days(1));
            if round {
                prop_assert_eq!(plan.window.end().timestamp() % interval as i64, 0);
            }
        }
    }
}
