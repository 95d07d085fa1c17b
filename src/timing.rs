//! Wall-clock timing of a benchmark run.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point in wall-clock time, as seconds and nanoseconds since the
/// Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    secs: u64,
    nanos: u32,
}

impl Timestamp {
    /// Create a timestamp from its parts.
    ///
    /// `nanos` must be less than one second.
    pub fn new(secs: u64, nanos: u32) -> Self {
        assert!(nanos < NANOS_PER_SEC);
        Self { secs, nanos }
    }

    /// The current wall-clock time.
    ///
    /// A clock set before the epoch reads as the epoch.
    pub fn now() -> Self {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: since.as_secs(),
            nanos: since.subsec_nanos(),
        }
    }
}

/// Elapsed time between two timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingResult {
    secs: u64,
    nanos: u32,
}

impl TimingResult {
    /// Time from `start` to `end`.
    ///
    /// If the end's sub-second part is smaller than the start's, one
    /// second is borrowed. If the wall clock stepped backwards so that
    /// `end` is before `start`, the result is zero.
    pub fn between(start: Timestamp, end: Timestamp) -> Self {
        if end < start {
            return Self { secs: 0, nanos: 0 };
        }
        if end.nanos < start.nanos {
            Self {
                secs: end.secs - start.secs - 1,
                nanos: end.nanos + NANOS_PER_SEC - start.nanos,
            }
        } else {
            Self {
                secs: end.secs - start.secs,
                nanos: end.nanos - start.nanos,
            }
        }
    }

    /// Whole seconds.
    pub fn secs(&self) -> u64 {
        self.secs
    }

    /// Nanoseconds past the whole seconds.
    pub fn nanos(&self) -> u32 {
        self.nanos
    }
}

impl fmt::Display for TimingResult {
    /// Format as `seconds.nanoseconds`, with nine fractional digits.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

#[cfg(test)]
mod test {
    use super::{Timestamp, TimingResult};

    #[test]
    fn plain_difference() {
        let t = TimingResult::between(Timestamp::new(10, 100), Timestamp::new(12, 300));
        assert_eq!((t.secs(), t.nanos()), (2, 200));
    }

    #[test]
    fn borrows_across_second_boundary() {
        let t = TimingResult::between(
            Timestamp::new(10, 500_000_000),
            Timestamp::new(11, 200_000_000),
        );
        assert_eq!((t.secs(), t.nanos()), (0, 700_000_000));
    }

    #[test]
    fn same_instant_is_zero() {
        let ts = Timestamp::new(5, 999_999_999);
        let t = TimingResult::between(ts, ts);
        assert_eq!((t.secs(), t.nanos()), (0, 0));
    }

    #[test]
    fn backwards_clock_is_zero() {
        let t = TimingResult::between(Timestamp::new(11, 0), Timestamp::new(10, 500));
        assert_eq!((t.secs(), t.nanos()), (0, 0));
    }

    #[test]
    fn formats_nine_digit_fraction() {
        let t = TimingResult::between(Timestamp::new(1, 0), Timestamp::new(3, 42));
        assert_eq!(t.to_string(), "2.000000042");
    }

    #[test]
    fn now_is_monotonic_enough() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        let t = TimingResult::between(a, b);
        assert!(t.nanos() < 1_000_000_000);
    }
}
