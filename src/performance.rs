//! Performance measurements from a benchmark run.

use crate::accumulated_time::AccumulatedTime;
use bytesize::ByteSize;
use log::info;

/// The kinds of clocks we have.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Clock {
    /// The whole batch loop.
    RunTime,

    /// Time spent synthesizing batches.
    Generation,

    /// Time spent waiting for the store to apply map writes.
    Submission,

    /// Time spent pausing between batches.
    Think,
}

/// Collected measurements from a run.
#[derive(Debug)]
pub struct Performance {
    args: Vec<String>,
    time: AccumulatedTime<Clock>,
    batches: u64,
    pairs: u64,
    value_bytes: u64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            args: std::env::args().collect(),
            time: AccumulatedTime::<Clock>::new(),
            batches: 0,
            pairs: 0,
            value_bytes: 0,
        }
    }
}

impl Performance {
    /// Log all performance measurements.
    pub fn log(&self) {
        info!("Performance measurements for this benchmark run");
        for (i, arg) in self.args.iter().enumerate() {
            info!("argv[{}]={:?}", i, arg);
        }
        info!("Batches written: {}", self.batches);
        info!("Pairs written: {}", self.pairs);
        info!("Value bytes written: {}", ByteSize(self.value_bytes));
        info!(
            "Generating batches (seconds): {:.6}",
            self.time.secs(Clock::Generation)
        );
        info!(
            "Submitting batches (seconds): {:.6}",
            self.time.secs(Clock::Submission)
        );
        info!(
            "Pausing between batches (seconds): {:.6}",
            self.time.secs(Clock::Think)
        );
        info!(
            "Complete run time (seconds): {:.6}",
            self.time.secs(Clock::RunTime)
        );
        let secs = self.time.secs(Clock::RunTime);
        if secs > 0.0 {
            info!("Pairs per second: {:.1}", self.pairs as f64 / secs);
        }
    }

    /// Start a specific clock.
    pub fn start(&mut self, clock: Clock) {
        self.time.start(clock)
    }

    /// Stop a specific clock.
    pub fn stop(&mut self, clock: Clock) {
        self.time.stop(clock)
    }

    /// Count a batch that the store has accepted.
    pub fn write_batch(&mut self, pairs: u64, value_bytes: u64) {
        self.batches += 1;
        self.pairs += pairs;
        self.value_bytes += value_bytes;
    }

    /// Number of batches written.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Number of pairs written.
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    /// Number of value bytes written.
    pub fn value_bytes(&self) -> u64 {
        self.value_bytes
    }
}
