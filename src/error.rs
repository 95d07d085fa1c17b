//! Errors reported by the benchmark program.

use crate::benchmark::ConfigError;
use crate::config::ClusterConfigError;
use crate::runner::RunError;
use crate::session::SessionError;
use thiserror::Error;

/// Define all the kinds of errors that can end a benchmark run.
///
/// Every one of them is fatal: the program reports it and exits.
#[derive(Debug, Error)]
pub enum OmapBenchError {
    /// Benchmark parameters are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cluster configuration file is unusable.
    #[error(transparent)]
    ClusterConfig(#[from] ClusterConfigError),

    /// The store couldn't be reached.
    #[error(transparent)]
    Connection(#[from] SessionError),

    /// The run itself failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Output couldn't be written.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
