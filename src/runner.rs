//! Run a map write benchmark against a storage session.

use crate::benchmark::BenchmarkConfig;
use crate::generator::{generate, BatchOffsets};
use crate::kvpair::KeyError;
use crate::performance::{Clock, Performance};
use crate::progress::RunProgress;
use crate::session::{SessionError, StorageSession};
use crate::timing::{Timestamp, TimingResult};

use log::{debug, info};
use std::io::Write;

/// Data written to the target object before its map is written, so
/// that the object exists.
pub const SETUP_PAYLOAD: &[u8] = b"Hello World!";

/// Drive a benchmark: write all batches into one object's map and
/// measure how long it takes.
///
/// Batches are generated and submitted strictly one after another.
/// The first failure ends the run; nothing is retried.
pub struct BatchWriteRunner<'a> {
    config: &'a BenchmarkConfig,
    object: String,
    perf: Performance,
    progress: Option<RunProgress>,
}

impl<'a> BatchWriteRunner<'a> {
    /// Create a runner that writes into the map of `object`.
    pub fn new(config: &'a BenchmarkConfig, object: &str) -> Self {
        Self {
            config,
            object: object.to_string(),
            perf: Performance::default(),
            progress: None,
        }
    }

    /// Show progress while running.
    pub fn with_progress(mut self, progress: RunProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Measurements collected so far.
    pub fn performance(&self) -> &Performance {
        &self.perf
    }

    /// Start from a fresh target object: remove whatever an earlier
    /// run left in its map, then write its data.
    pub fn setup<S: StorageSession>(&self, session: &mut S) -> Result<(), RunError> {
        session
            .remove_object(&self.object)
            .map_err(|err| RunError::SetupRemove(self.object.clone(), err))?;
        session
            .write_object(&self.object, SETUP_PAYLOAD)
            .map_err(|err| RunError::SetupWrite(self.object.clone(), err))?;
        debug!("wrote setup data to object {}", self.object);
        Ok(())
    }

    /// Write every batch and return the elapsed wall-clock time.
    ///
    /// If the configuration asks for debug output, each generated pair
    /// is written to `out` as one line.
    pub fn run<S, W>(&mut self, session: &mut S, out: &mut W) -> Result<TimingResult, RunError>
    where
        S: StorageSession,
        W: Write,
    {
        let batch_size = self.config.batch_size();
        info!(
            "writing {} pairs into map of {} in batches of {}",
            self.config.total_pairs(),
            self.object,
            batch_size
        );

        let start = Timestamp::now();
        self.perf.start(Clock::RunTime);
        let result = self.write_batches(session, out);
        self.perf.stop(Clock::RunTime);
        let end = Timestamp::now();

        if let Some(progress) = &self.progress {
            progress.finish();
        }
        result?;

        let elapsed = TimingResult::between(start, end);
        info!(
            "wrote {} batches ({} pairs) in {} seconds",
            self.perf.batches(),
            self.perf.pairs(),
            elapsed
        );
        Ok(elapsed)
    }

    fn write_batches<S, W>(&mut self, session: &mut S, out: &mut W) -> Result<(), RunError>
    where
        S: StorageSession,
        W: Write,
    {
        let offsets = BatchOffsets::new(self.config.total_pairs(), self.config.batch_size() as u64);
        for offset in offsets {
            self.perf.start(Clock::Generation);
            let batch = generate(self.config.batch_size(), offset, self.config.value_size());
            self.perf.stop(Clock::Generation);
            let batch = batch.map_err(|err| RunError::Generate(offset, err))?;

            if self.config.debug() {
                for pair in batch.iter() {
                    writeln!(
                        out,
                        " key {} val {} len {}",
                        pair.key(),
                        pair.value_text(),
                        pair.len()
                    )
                    .map_err(RunError::Output)?;
                }
            }

            let pairs = batch.len() as u64;
            let value_bytes = batch.value_bytes();

            self.perf.start(Clock::Submission);
            let written = session
                .create_write_op(batch)
                .map_err(|err| RunError::WriteOpCreation(offset, err))
                .and_then(|op| {
                    session
                        .operate(&self.object, op)
                        .map_err(|source| RunError::WriteFailure {
                            offset,
                            object: self.object.clone(),
                            source,
                        })
                });
            self.perf.stop(Clock::Submission);
            written?;

            self.perf.write_batch(pairs, value_bytes);
            if let Some(progress) = &self.progress {
                progress.wrote_batch(pairs);
            }

            let think_time = self.config.think_time();
            if !think_time.is_zero() {
                self.perf.start(Clock::Think);
                std::thread::sleep(think_time);
                self.perf.stop(Clock::Think);
            }
        }
        Ok(())
    }
}

/// Possible errors from a benchmark run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The object left by an earlier run couldn't be removed.
    #[error("cannot remove object {0}: {1}")]
    SetupRemove(String, #[source] SessionError),

    /// The object couldn't be created before writing its map.
    #[error("cannot write object {0}: {1}")]
    SetupWrite(String, #[source] SessionError),

    /// A batch couldn't be generated.
    #[error("cannot generate batch at offset {0}: {1}")]
    Generate(u64, #[source] KeyError),

    /// A write operation couldn't be prepared for a batch.
    #[error("cannot create write op at offset {0}: {1}")]
    WriteOpCreation(u64, #[source] SessionError),

    /// The store failed to apply a batch.
    #[error("cannot write omap to object {object} at offset {offset}: {source}")]
    WriteFailure {
        /// Offset of the first pair in the failed batch.
        offset: u64,
        /// Object whose map was being written.
        object: String,
        /// What went wrong.
        source: SessionError,
    },

    /// Debug output couldn't be written.
    #[error("cannot write diagnostic output: {0}")]
    Output(#[source] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::{BatchWriteRunner, RunError, SETUP_PAYLOAD};
    use crate::benchmark::{BenchmarkConfig, OperationType};
    use crate::kvpair::Batch;
    use crate::session::{LocalSession, SessionError, StorageSession};
    use std::time::Duration;
    use tempfile::tempdir;

    // A session that records what it's asked to do, and optionally
    // fails the nth map write.
    #[derive(Default)]
    struct FakeSession {
        removed: Vec<String>,
        objects: Vec<(String, Vec<u8>)>,
        operations: usize,
        written: Vec<Batch>,
        fail_on: Option<usize>,
        fail_setup: bool,
        closed: bool,
    }

    impl StorageSession for FakeSession {
        type WriteOp = Batch;

        fn remove_object(&mut self, object: &str) -> Result<(), SessionError> {
            self.removed.push(object.to_string());
            self.objects.clear();
            self.written.clear();
            Ok(())
        }

        fn write_object(&mut self, object: &str, payload: &[u8]) -> Result<(), SessionError> {
            if self.fail_setup {
                return Err(SessionError::Closed);
            }
            self.objects.push((object.to_string(), payload.to_vec()));
            Ok(())
        }

        fn create_write_op(&self, batch: Batch) -> Result<Self::WriteOp, SessionError> {
            Ok(batch)
        }

        fn operate(&mut self, _object: &str, op: Self::WriteOp) -> Result<(), SessionError> {
            self.operations += 1;
            if self.fail_on == Some(self.operations) {
                return Err(SessionError::Closed);
            }
            self.written.push(op);
            Ok(())
        }

        fn map_len(&self, _object: &str) -> Result<u64, SessionError> {
            Ok(self.written.iter().map(|b| b.len() as u64).sum())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn config(total: u64, batch: usize, value: usize, debug: bool) -> BenchmarkConfig {
        BenchmarkConfig::new(OperationType::Write, batch, total, value, debug).unwrap()
    }

    #[test]
    fn setup_writes_object() {
        let config = config(10, 3, 2, false);
        let runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession::default();
        runner.setup(&mut session).unwrap();
        assert_eq!(session.removed, vec!["hw".to_string()]);
        assert_eq!(
            session.objects,
            vec![("hw".to_string(), SETUP_PAYLOAD.to_vec())]
        );
    }

    #[test]
    fn failed_setup_is_reported() {
        let config = config(10, 3, 2, false);
        let runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession {
            fail_setup: true,
            ..FakeSession::default()
        };
        assert!(matches!(
            runner.setup(&mut session),
            Err(RunError::SetupWrite(_, _))
        ));
    }

    #[test]
    fn writes_full_batches_past_total() {
        let config = config(10, 3, 2, false);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession::default();
        let mut out: Vec<u8> = vec![];
        let elapsed = runner.run(&mut session, &mut out).unwrap();
        assert!(elapsed.nanos() < 1_000_000_000);

        assert_eq!(session.written.len(), 4);
        let firsts: Vec<&str> = session
            .written
            .iter()
            .map(|b| b.pairs()[0].key())
            .collect();
        assert_eq!(firsts, vec!["00000000", "00000003", "00000006", "00000009"]);
        assert!(session.written.iter().all(|b| b.len() == 3));
        assert_eq!(session.map_len("hw").unwrap(), 12);
        assert_eq!(session.written[3].pairs()[2].key(), "00000011");
        assert_eq!(runner.performance().pairs(), 12);
        assert_eq!(runner.performance().batches(), 4);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_total_writes_nothing() {
        let config = config(0, 5, 2, false);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession::default();
        runner.run(&mut session, &mut std::io::sink()).unwrap();
        assert!(session.written.is_empty());
        assert_eq!(session.operations, 0);
    }

    #[test]
    fn stops_at_first_failed_batch() {
        let config = config(100, 3, 2, false);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession {
            fail_on: Some(3),
            ..FakeSession::default()
        };
        match runner.run(&mut session, &mut std::io::sink()) {
            Err(RunError::WriteFailure { offset, object, .. }) => {
                assert_eq!(offset, 6);
                assert_eq!(object, "hw");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(session.operations, 3);
        assert_eq!(session.written.len(), 2);
        assert_eq!(runner.performance().batches(), 2);
        assert!(!session.closed);
    }

    #[test]
    fn failure_stops_debug_output_too() {
        let config = config(100, 2, 1, true);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession {
            fail_on: Some(3),
            ..FakeSession::default()
        };
        let mut out: Vec<u8> = vec![];
        assert!(runner.run(&mut session, &mut out).is_err());
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(!text.contains("00000006"));
    }

    #[test]
    fn debug_prints_each_pair() {
        let config = config(2, 2, 3, true);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession::default();
        let mut out: Vec<u8> = vec![];
        runner.run(&mut session, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            " key 00000000 val 012 len 3\n key 00000001 val 123 len 3\n"
        );
    }

    #[test]
    fn key_overflow_aborts_run() {
        let config = config(1, 100_000_001, 0, false);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession::default();
        let res = runner.run(&mut session, &mut std::io::sink());
        assert!(matches!(res, Err(RunError::Generate(0, _))));
        assert!(session.written.is_empty());
    }

    #[test]
    fn pauses_after_each_batch() {
        let config = config(6, 2, 1, false).with_think_time(Duration::from_millis(20));
        let mut runner = BatchWriteRunner::new(&config, "hw");
        let mut session = FakeSession::default();
        let elapsed = runner.run(&mut session, &mut std::io::sink()).unwrap();
        assert_eq!(session.written.len(), 3);
        let total = Duration::new(elapsed.secs(), elapsed.nanos());
        assert!(total >= Duration::from_millis(60));
    }

    #[test]
    fn setup_clears_map_from_earlier_run() {
        let dir = tempdir().unwrap();
        let mut session = LocalSession::open(&dir.path().join("store.db"), "ben").unwrap();
        let config = config(10, 3, 2, false);

        let mut runner = BatchWriteRunner::new(&config, "hw");
        runner.setup(&mut session).unwrap();
        runner.run(&mut session, &mut std::io::sink()).unwrap();
        session
            .atomic_map_write("hw", crate::generator::generate(5, 500, 1).unwrap())
            .unwrap();
        assert_eq!(session.map_len("hw").unwrap(), 17);

        let mut runner = BatchWriteRunner::new(&config, "hw");
        runner.setup(&mut session).unwrap();
        assert_eq!(session.map_len("hw").unwrap(), 0);
        runner.run(&mut session, &mut std::io::sink()).unwrap();
        assert_eq!(session.map_len("hw").unwrap(), 12);
    }

    #[test]
    fn runs_against_local_store() {
        let dir = tempdir().unwrap();
        let mut session = LocalSession::open(&dir.path().join("store.db"), "ben").unwrap();
        let config = config(10, 3, 2, false);
        let mut runner = BatchWriteRunner::new(&config, "hw");
        runner.setup(&mut session).unwrap();
        runner.run(&mut session, &mut std::io::sink()).unwrap();
        assert_eq!(session.map_len("hw").unwrap(), 12);
        session.close();
    }
}
