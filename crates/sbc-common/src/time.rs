//! Monotonic timestamps in `timespec` form.
//!
//! Absolute deadlines are kept as a seconds + nanoseconds pair so they map
//! one-to-one onto the `struct timespec` passed to
//! `clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME, ..)`. All arithmetic is
//! integer nanoseconds; after every addition the pair is normalized so the
//! nanosecond field stays in `[0, NANOS_PER_SEC)`.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u32 = 1_000_000_000;

// `tv_nsec` is a 32-bit `long` on armv7 boards.
const_assert!(NANOS_PER_SEC <= i32::MAX as u32);

/// A point on the monotonic clock with nanosecond resolution.
///
/// Ordering compares seconds first, then nanoseconds, which is correct
/// because the value is always normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MonoTime {
    secs: i64,
    nanos: u32,
}

impl MonoTime {
    /// The clock origin.
    pub const ZERO: MonoTime = MonoTime { secs: 0, nanos: 0 };

    /// The latest representable instant.
    pub const MAX: MonoTime = MonoTime {
        secs: i64::MAX,
        nanos: NANOS_PER_SEC - 1,
    };

    /// Create a timestamp, rolling excess nanoseconds into seconds.
    ///
    /// Saturates at [`MonoTime::MAX`].
    #[must_use]
    pub fn new(secs: i64, nanos: u64) -> Self {
        let carry = nanos / u64::from(NANOS_PER_SEC);
        #[allow(clippy::cast_possible_truncation)]
        let nanos = (nanos % u64::from(NANOS_PER_SEC)) as u32;
        match i64::try_from(carry).ok().and_then(|c| secs.checked_add(c)) {
            Some(secs) => Self { secs, nanos },
            None => Self::MAX,
        }
    }

    /// Create a timestamp from a total nanosecond count.
    #[must_use]
    pub fn from_nanos(total: u64) -> Self {
        Self::new(0, total)
    }

    /// Whole seconds component.
    #[must_use]
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Nanosecond component, always in `[0, NANOS_PER_SEC)`.
    #[must_use]
    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Total nanoseconds since the clock origin.
    #[must_use]
    pub fn as_nanos(&self) -> i128 {
        i128::from(self.secs) * i128::from(NANOS_PER_SEC) + i128::from(self.nanos)
    }

    /// Signed distance `self - earlier` in nanoseconds.
    ///
    /// Positive when `self` is later than `earlier`.
    #[must_use]
    pub fn nanos_since(&self, earlier: MonoTime) -> i128 {
        self.as_nanos() - earlier.as_nanos()
    }

    /// Non-negative duration since `earlier`, zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: MonoTime) -> Duration {
        let diff = self.nanos_since(earlier);
        if diff <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::try_from(diff).unwrap_or(u64::MAX))
        }
    }

    /// `self + rhs`, or `None` if the result is past [`MonoTime::MAX`].
    #[must_use]
    pub fn checked_add(self, rhs: Duration) -> Option<MonoTime> {
        let secs = self.secs.checked_add(i64::try_from(rhs.as_secs()).ok()?)?;
        let nanos = self.nanos + rhs.subsec_nanos();
        if nanos >= NANOS_PER_SEC {
            Some(MonoTime {
                secs: secs.checked_add(1)?,
                nanos: nanos - NANOS_PER_SEC,
            })
        } else {
            Some(MonoTime { secs, nanos })
        }
    }

    /// Advance by `interval`, keeping the pair normalized.
    pub fn advance(&mut self, interval: Duration) {
        *self = *self + interval;
    }
}

/// Saturates at [`MonoTime::MAX`] instead of wrapping.
impl Add<Duration> for MonoTime {
    type Output = MonoTime;

    fn add(self, rhs: Duration) -> MonoTime {
        self.checked_add(rhs).unwrap_or(MonoTime::MAX)
    }
}

impl AddAssign<Duration> for MonoTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Display for MonoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

/// Convert a duration to integer nanoseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes() {
        let t = MonoTime::new(1, 2_500_000_000);
        assert_eq!(t.secs(), 3);
        assert_eq!(t.subsec_nanos(), 500_000_000);
    }

    #[test]
    fn test_add_rolls_over() {
        let t = MonoTime::new(10, 999_999_999) + Duration::from_nanos(1);
        assert_eq!(t, MonoTime::new(11, 0));

        let t = MonoTime::new(10, 900_000_000) + Duration::from_millis(250);
        assert_eq!(t.secs(), 11);
        assert_eq!(t.subsec_nanos(), 150_000_000);
    }

    #[test]
    fn test_add_whole_seconds() {
        let t = MonoTime::new(5, 1) + Duration::new(3, 999_999_999);
        assert_eq!(t, MonoTime::new(9, 0));
    }

    #[test]
    fn test_ordering() {
        assert!(MonoTime::new(1, 999_999_999) < MonoTime::new(2, 0));
        assert!(MonoTime::new(2, 1) > MonoTime::new(2, 0));
    }

    #[test]
    fn test_nanos_since() {
        let a = MonoTime::new(1, 900_000_000);
        let b = MonoTime::new(2, 100_000_000);
        assert_eq!(b.nanos_since(a), 200_000_000);
        assert_eq!(a.nanos_since(b), -200_000_000);
        assert_eq!(a.saturating_duration_since(b), Duration::ZERO);
        assert_eq!(b.saturating_duration_since(a), Duration::from_millis(200));
    }

    #[test]
    fn test_display() {
        assert_eq!(MonoTime::new(12, 34).to_string(), "12.000000034");
    }

    #[test]
    fn test_add_saturates_instead_of_wrapping() {
        let origin = MonoTime::new(1000, 0);
        // Seconds past i64::MAX.
        let huge = Duration::from_secs(u64::MAX);

        assert_eq!(origin.checked_add(huge), None);
        let target = origin + huge;
        assert_eq!(target, MonoTime::MAX);
        assert!(target > origin);

        let mut t = MonoTime::new(i64::MAX, 999_999_999);
        t.advance(Duration::from_nanos(1));
        assert_eq!(t, MonoTime::MAX);
        assert_eq!(MonoTime::new(i64::MAX, 2_000_000_000), MonoTime::MAX);
    }

    #[test]
    fn test_checked_add_carries() {
        assert_eq!(
            MonoTime::new(1, 600_000_000).checked_add(Duration::from_millis(500)),
            Some(MonoTime::new(2, 100_000_000))
        );
    }

    #[test]
    fn test_advance_matches_multiplication() {
        let origin = MonoTime::new(100, 123_456_789);
        let interval = Duration::from_nanos(333_333_333);
        let mut t = origin;
        for n in 1..=30_000u64 {
            t.advance(interval);
            assert!(t.subsec_nanos() < NANOS_PER_SEC);
            assert_eq!(
                t.as_nanos(),
                origin.as_nanos() + i128::from(n) * 333_333_333
            );
        }
    }
}
