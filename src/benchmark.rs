//! What a benchmark run does: its shape and its validation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Longest pause between batches that we accept, in seconds.
const MAX_THINK_TIME: f64 = 3600.0;

/// Kinds of map operations a benchmark can measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    /// Read pairs back from an object's map. Recognized, but not
    /// supported yet.
    Read,

    /// Write pairs into an object's map.
    Write,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Write => "write",
        };
        f.pad(s)
    }
}

impl FromStr for OperationType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            _ => Err(ConfigError::InvalidOperation(s.to_string())),
        }
    }
}

/// The parameters of one benchmark run.
///
/// Once created, a configuration is valid and doesn't change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkConfig {
    operation: OperationType,
    batch_size: usize,
    total_pairs: u64,
    value_size: usize,
    debug: bool,
    think_time: Duration,
}

impl BenchmarkConfig {
    /// Create a validated configuration.
    pub fn new(
        operation: OperationType,
        batch_size: usize,
        total_pairs: u64,
        value_size: usize,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        if operation == OperationType::Read {
            return Err(ConfigError::ReadNotSupported);
        }
        if batch_size == 0 {
            return Err(ConfigError::NotPositive("0".to_string()));
        }
        Ok(Self {
            operation,
            batch_size,
            total_pairs,
            value_size,
            debug,
            think_time: Duration::ZERO,
        })
    }

    /// Pause for `think_time` after each batch the store accepts.
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    /// The kind of operation being measured.
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Number of pairs in each map write.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of pairs the run aims to write.
    pub fn total_pairs(&self) -> u64 {
        self.total_pairs
    }

    /// Size of each value in bytes.
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Should each generated pair be printed?
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Pause after each batch. Zero means no pause.
    pub fn think_time(&self) -> Duration {
        self.think_time
    }

    /// Number of pairs the run will actually write.
    ///
    /// Every batch is full, so this is `total_pairs` rounded up to a
    /// multiple of the batch size.
    pub fn planned_pairs(&self) -> u64 {
        let batch = self.batch_size as u64;
        let batches = self.total_pairs / batch + u64::from(self.total_pairs % batch != 0);
        batches.saturating_mul(batch)
    }

    /// Lines describing the run, printed before it starts.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("{:>11} : key-value pairs per call", self.batch_size),
            format!("{:>11} : total key-value pairs", self.total_pairs),
            format!("{:>11} : value size in bytes", self.value_size),
            format!("{:>11} : operation type", self.operation),
        ];
        if !self.think_time.is_zero() {
            lines.push(format!(
                "{:>11.3} : think time in seconds",
                self.think_time.as_secs_f64()
            ));
        }
        lines
    }
}

/// Parse a base-10 integer.
///
/// Text that parses to zero is only accepted if it is exactly "0".
pub fn parse_int(text: &str) -> Result<i64, ConfigError> {
    let value: i64 = text
        .parse()
        .map_err(|_| ConfigError::NotAnInteger(text.to_string()))?;
    if value == 0 && text != "0" {
        return Err(ConfigError::NotAnInteger(text.to_string()));
    }
    Ok(value)
}

/// Parse an integer that must be greater than zero.
pub fn parse_positive(text: &str) -> Result<usize, ConfigError> {
    let value = parse_int(text)?;
    if value <= 0 {
        return Err(ConfigError::NotPositive(text.to_string()));
    }
    usize::try_from(value).map_err(|_| ConfigError::OutOfRange(text.to_string()))
}

/// Parse an integer that must not be negative.
pub fn parse_non_negative(text: &str) -> Result<u64, ConfigError> {
    let value = parse_int(text)?;
    if value < 0 {
        return Err(ConfigError::Negative(text.to_string()));
    }
    u64::try_from(value).map_err(|_| ConfigError::OutOfRange(text.to_string()))
}

/// Parse a value size: non-negative, and addressable in memory.
pub fn parse_size(text: &str) -> Result<usize, ConfigError> {
    let value = parse_non_negative(text)?;
    usize::try_from(value).map_err(|_| ConfigError::OutOfRange(text.to_string()))
}

/// Parse a pause length in seconds, such as "0.25".
pub fn parse_think_time(text: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = text
        .parse()
        .map_err(|_| ConfigError::BadThinkTime(text.to_string()))?;
    if !(0.0..=MAX_THINK_TIME).contains(&secs) {
        return Err(ConfigError::BadThinkTime(text.to_string()));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Possible errors in benchmark parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Text is not a base-10 integer.
    #[error("{0}: not an integer")]
    NotAnInteger(String),

    /// Integer must be greater than zero.
    #[error("{0}: not a positive integer value")]
    NotPositive(String),

    /// Integer must not be negative.
    #[error("{0}: not a non-negative integer value")]
    Negative(String),

    /// Integer doesn't fit the type it's stored in.
    #[error("{0}: integer out of range")]
    OutOfRange(String),

    /// Operation type is not one we know about.
    #[error("{0}: invalid operation type")]
    InvalidOperation(String),

    /// Think time is not a number of seconds in the accepted range.
    #[error("{0}: think time must be between 0 and 3600 seconds")]
    BadThinkTime(String),

    /// Reading is recognized, but not implemented.
    #[error("read: read not yet supported")]
    ReadNotSupported,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_int("0").unwrap(), 0);
        assert_eq!(parse_int("17").unwrap(), 17);
        assert_eq!(parse_int("-3").unwrap(), -3);
    }

    #[test]
    fn rejects_non_integers() {
        assert!(parse_int("").is_err());
        assert!(parse_int("abc").is_err());
        assert!(parse_int("12abc").is_err());
        assert!(parse_int("0x10").is_err());
        assert!(parse_int("1.5").is_err());
    }

    #[test]
    fn zero_only_from_plain_zero() {
        assert!(parse_int("00").is_err());
        assert!(parse_int("-0").is_err());
        assert!(parse_int("+0").is_err());
    }

    #[test]
    fn batch_size_must_be_positive() {
        assert!(matches!(parse_positive("0"), Err(ConfigError::NotPositive(_))));
        assert!(matches!(parse_positive("-3"), Err(ConfigError::NotPositive(_))));
        assert_eq!(parse_positive("3").unwrap(), 3);
    }

    #[test]
    fn total_must_not_be_negative() {
        assert!(matches!(parse_non_negative("-1"), Err(ConfigError::Negative(_))));
        assert_eq!(parse_non_negative("0").unwrap(), 0);
    }

    #[test]
    fn parses_operation_types() {
        assert_eq!("write".parse::<OperationType>().unwrap(), OperationType::Write);
        assert_eq!("read".parse::<OperationType>().unwrap(), OperationType::Read);
        assert!(matches!(
            "delete".parse::<OperationType>(),
            Err(ConfigError::InvalidOperation(_))
        ));
    }

    #[test]
    fn read_is_rejected() {
        let res = BenchmarkConfig::new(OperationType::Read, 1, 10, 2, false);
        assert!(matches!(res, Err(ConfigError::ReadNotSupported)));
    }

    #[test]
    fn read_is_rejected_even_with_bad_batch_size() {
        let res = BenchmarkConfig::new(OperationType::Read, 0, 0, 0, true);
        assert!(matches!(res, Err(ConfigError::ReadNotSupported)));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let res = BenchmarkConfig::new(OperationType::Write, 0, 10, 2, false);
        assert!(matches!(res, Err(ConfigError::NotPositive(_))));
    }

    #[test]
    fn accepts_zero_total() {
        let config = BenchmarkConfig::new(OperationType::Write, 5, 0, 2, false).unwrap();
        assert_eq!(config.total_pairs(), 0);
    }

    #[test]
    fn summary_is_right_aligned() {
        let config = BenchmarkConfig::new(OperationType::Write, 3, 10, 2, false).unwrap();
        let summary = config.summary();
        assert_eq!(summary[0], "          3 : key-value pairs per call");
        assert_eq!(summary[3], "      write : operation type");
        assert_eq!(summary.len(), 4);
    }

    #[test]
    fn summary_mentions_think_time_when_set() {
        let config = BenchmarkConfig::new(OperationType::Write, 3, 10, 2, false)
            .unwrap()
            .with_think_time(Duration::from_millis(250));
        let summary = config.summary();
        assert_eq!(summary.len(), 5);
        assert_eq!(summary[4], "      0.250 : think time in seconds");
    }

    #[test]
    fn planned_pairs_fill_last_batch() {
        let planned = |total, batch| {
            BenchmarkConfig::new(OperationType::Write, batch, total, 2, false)
                .unwrap()
                .planned_pairs()
        };
        assert_eq!(planned(10, 3), 12);
        assert_eq!(planned(9, 3), 9);
        assert_eq!(planned(0, 5), 0);
        assert_eq!(planned(1, 100), 100);
    }

    #[test]
    fn parses_think_time() {
        assert_eq!(parse_think_time("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_think_time("0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_think_time("-1").is_err());
        assert!(parse_think_time("NaN").is_err());
        assert!(parse_think_time("inf").is_err());
        assert!(parse_think_time("soon").is_err());
        assert!(parse_think_time("3601").is_err());
    }
}
