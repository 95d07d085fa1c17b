//! Measure accumulated time for the phases of a run.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Accumulated times for different clocks.
///
/// The caller defines a clock type, usually an enum. A clock that is
/// never started measures zero. A clock may be started and stopped
/// many times; each span is added to its total.
#[derive(Debug)]
pub struct AccumulatedTime<T> {
    accumulated: HashMap<T, ClockTime>,
}

#[derive(Debug, Default)]
struct ClockTime {
    spent: Duration,
    started: Option<Instant>,
}

impl<T: Eq + Hash + Copy> AccumulatedTime<T> {
    /// Create a new accumulated time collector.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            accumulated: HashMap::new(),
        }
    }

    /// Start a clock. Starting a running clock is a no-op.
    pub fn start(&mut self, clock: T) {
        let ct = self.accumulated.entry(clock).or_default();
        if ct.started.is_none() {
            ct.started = Some(Instant::now());
        }
    }

    /// Stop a running clock, adding its span to the total.
    pub fn stop(&mut self, clock: T) {
        if let Some(ct) = self.accumulated.get_mut(&clock) {
            if let Some(started) = ct.started.take() {
                ct.spent += started.elapsed();
            }
        }
    }

    /// Time accumulated by a clock, including a span still running.
    pub fn duration(&self, clock: T) -> Duration {
        match self.accumulated.get(&clock) {
            Some(ct) => match ct.started {
                Some(started) => ct.spent + started.elapsed(),
                None => ct.spent,
            },
            None => Duration::ZERO,
        }
    }

    /// Time accumulated by a clock, as fractional seconds.
    pub fn secs(&self, clock: T) -> f64 {
        self.duration(clock).as_secs_f64()
    }
}

#[cfg(test)]
mod test {
    use super::AccumulatedTime;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Clock {
        A,
        B,
    }

    #[test]
    fn unused_clock_is_zero() {
        let time = AccumulatedTime::<Clock>::new();
        assert_eq!(time.duration(Clock::A), Duration::ZERO);
    }

    #[test]
    fn accumulates_spans() {
        let mut time = AccumulatedTime::new();
        time.start(Clock::A);
        std::thread::sleep(Duration::from_millis(2));
        time.stop(Clock::A);
        let first = time.duration(Clock::A);
        assert!(first >= Duration::from_millis(2));

        time.start(Clock::A);
        std::thread::sleep(Duration::from_millis(2));
        time.stop(Clock::A);
        assert!(time.duration(Clock::A) >= first + Duration::from_millis(2));
        assert_eq!(time.duration(Clock::B), Duration::ZERO);
    }

    #[test]
    fn stopping_unstarted_clock_is_harmless() {
        let mut time = AccumulatedTime::new();
        time.stop(Clock::B);
        assert_eq!(time.duration(Clock::B), Duration::ZERO);
    }
}
