//! Wall-clock rules for time-driven release transitions.
//!
//! Release dates are stored and compared in UTC. The only place a local
//! timezone matters is the definition of "today": the daily reconciliation
//! sweep runs at local midnight and covers everything due before the next
//! one. The offset is explicit configuration, never implied.

use chrono::{Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default local offset for "today" (UTC-03:00).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// Default delay added to a one-off timer so it fires after its target.
pub const DEFAULT_TIMER_SKEW_SECS: i64 = 1;

/// Calendar helper for the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleClock {
    offset: FixedOffset,
    skew: Duration,
}

impl Default for ScheduleClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
            skew: Duration::seconds(DEFAULT_TIMER_SKEW_SECS),
        }
    }
}

impl ScheduleClock {
    /// Build a clock from a UTC offset in minutes (east positive) and a
    /// timer skew in seconds.
    pub fn new(utc_offset_minutes: i32, skew_secs: i64) -> Result<Self, CoreError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            CoreError::Validation(format!(
                "UTC offset of {utc_offset_minutes} minutes is out of range"
            ))
        })?;
        let skew = Duration::try_seconds(skew_secs)
            .filter(|skew| *skew >= Duration::zero())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Timer skew must be a non-negative number of seconds, got {skew_secs}"
                ))
            })?;
        Ok(Self { offset, skew })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// UTC bounds `[start, end)` of the local day containing `now`.
    pub fn local_day_bounds(&self, now: Timestamp) -> (Timestamp, Timestamp) {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let start = self
            .offset
            .from_local_datetime(&local_date.and_time(NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        (start, start + Duration::days(1))
    }

    /// The next local midnight strictly after `now`, in UTC.
    pub fn next_local_midnight(&self, now: Timestamp) -> Timestamp {
        self.local_day_bounds(now).1
    }

    /// Whether `at` falls before the next daily sweep, i.e. is due "today".
    pub fn due_today(&self, at: Timestamp, now: Timestamp) -> bool {
        at < self.next_local_midnight(now)
    }

    /// Instant a one-off timer for `target` should fire.
    pub fn fire_at(&self, target: Timestamp) -> Timestamp {
        target + self.skew
    }

    /// How long to sleep from `now` before firing the timer for `target`.
    /// Zero when the target has already passed.
    pub fn delay_until(&self, target: Timestamp, now: Timestamp) -> std::time::Duration {
        (self.fire_at(target) - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn utc(day: u32, hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 5, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn default_clock_uses_utc_minus_three() {
        let clock = ScheduleClock::default();
        assert_eq!(clock.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn local_midnight_at_minus_three_is_three_am_utc() {
        let clock = ScheduleClock::new(-180, 0).unwrap();
        // 01:00 UTC on the 10th is still the 9th locally (22:00).
        assert_eq!(clock.next_local_midnight(utc(10, 1, 0)), utc(10, 3, 0));
        // 04:00 UTC on the 10th is the 10th locally.
        assert_eq!(clock.next_local_midnight(utc(10, 4, 0)), utc(11, 3, 0));
    }

    #[test]
    fn day_bounds_span_twenty_four_hours() {
        let clock = ScheduleClock::new(120, 0).unwrap();
        let (start, end) = clock.local_day_bounds(utc(10, 12, 0));
        assert_eq!(start, utc(9, 22, 0));
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn utc_clock_has_no_shift() {
        let clock = ScheduleClock::new(0, 0).unwrap();
        assert_eq!(clock.next_local_midnight(utc(10, 23, 59)), utc(11, 0, 0));
    }

    #[test]
    fn due_today_stops_at_next_local_midnight() {
        let clock = ScheduleClock::new(-180, 0).unwrap();
        let now = utc(10, 12, 0);
        assert!(clock.due_today(utc(11, 2, 59), now));
        assert!(!clock.due_today(utc(11, 3, 0), now));
    }

    #[test]
    fn delay_includes_skew_and_saturates_at_zero() {
        let clock = ScheduleClock::new(0, 2).unwrap();
        let now = utc(10, 12, 0);
        assert_eq!(
            clock.delay_until(utc(10, 12, 1), now),
            std::time::Duration::from_secs(62)
        );
        assert_eq!(
            clock.delay_until(utc(10, 11, 0), now),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        assert!(ScheduleClock::new(24 * 60, 0).is_err());
        assert!(ScheduleClock::new(0, -1).is_err());
    }

    #[test]
    fn unrepresentable_skew_is_rejected() {
        assert_matches!(ScheduleClock::new(0, i64::MAX), Err(CoreError::Validation(_)));
    }
}
