//! Cluster configuration for the benchmark client.

use log::trace;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POOL: &str = "ben";
const DEFAULT_OBJECT: &str = "hw";
const DEVNULL: &str = "/dev/null";
const SYSTEM_CONFIG: &str = "/etc/omapbench/cluster.yaml";

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
struct TentativeClusterConfig {
    server_url: Option<String>,
    local: Option<PathBuf>,
    pool: Option<String>,
    object: Option<String>,
    verify_tls_cert: Option<bool>,
    timeout: Option<u64>,
    log: Option<PathBuf>,
}

/// Where the object store is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// An `omapbench-server` reached over HTTP.
    Remote(String),

    /// A store file opened in this process.
    Local(PathBuf),
}

/// Configuration for reaching the object store.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Name of configuration file.
    pub filename: PathBuf,
    /// Where the store is.
    pub location: StoreLocation,
    /// Pool that holds the benchmark object.
    pub pool: String,
    /// Object whose map is written.
    pub object: String,
    /// Should the server's TLS certificate be verified using CA
    /// signatures? Set to false, for self-signed certificates.
    pub verify_tls_cert: bool,
    /// Give up on a request to the server after this long. Without
    /// it, a hung request hangs the run.
    pub timeout: Option<Duration>,
    /// File where logs should be written.
    pub log: PathBuf,
}

impl ClusterConfig {
    /// Read a cluster configuration from a file.
    pub fn read(filename: &Path) -> Result<Self, ClusterConfigError> {
        trace!("read cluster config: filename={:?}", filename);
        let text = std::fs::read_to_string(filename)
            .map_err(|err| ClusterConfigError::Read(filename.to_path_buf(), err))?;
        Self::parse(filename, &text)
    }

    fn parse(filename: &Path, text: &str) -> Result<Self, ClusterConfigError> {
        let tentative: TentativeClusterConfig = serde_yaml::from_str(text)
            .map_err(|err| ClusterConfigError::YamlParse(filename.to_path_buf(), err))?;

        let location = match (tentative.server_url, tentative.local) {
            (Some(url), None) => StoreLocation::Remote(url),
            (None, Some(path)) => StoreLocation::Local(expand_tilde(&path)),
            (Some(_), Some(_)) => return Err(ClusterConfigError::BothLocations),
            (None, None) => return Err(ClusterConfigError::NoLocation),
        };
        let log = tentative
            .log
            .map(|path| expand_tilde(&path))
            .unwrap_or_else(|| PathBuf::from(DEVNULL));

        let config = Self {
            filename: filename.to_path_buf(),
            location,
            pool: tentative.pool.unwrap_or_else(|| DEFAULT_POOL.to_string()),
            object: tentative
                .object
                .unwrap_or_else(|| DEFAULT_OBJECT.to_string()),
            verify_tls_cert: tentative.verify_tls_cert.unwrap_or(false),
            timeout: tentative.timeout.map(Duration::from_secs),
            log,
        };

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ClusterConfigError> {
        if let StoreLocation::Remote(url) = &self.location {
            if url.is_empty() {
                return Err(ClusterConfigError::ServerUrlIsEmpty);
            }
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ClusterConfigError::NotHttp(url.to_string()));
            }
        }
        if self.pool.is_empty() {
            return Err(ClusterConfigError::PoolIsEmpty);
        }
        if self.object.is_empty() {
            return Err(ClusterConfigError::ObjectIsEmpty);
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ClusterConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// The configuration file to use when none is given.
///
/// This is `omapbench/cluster.yaml` in the user's configuration
/// directory if it exists there, or the system-wide file otherwise.
pub fn default_config() -> PathBuf {
    if let Some(dirs) = directories_next::ProjectDirs::from("", "", "omapbench") {
        let path = dirs.config_dir().join("cluster.yaml");
        if path.exists() {
            return path;
        }
    }
    PathBuf::from(SYSTEM_CONFIG)
}

/// Possible errors from configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ClusterConfigError {
    /// The configuration gives neither a server nor a local store.
    #[error("configuration must set either server_url or local")]
    NoLocation,

    /// The configuration gives both a server and a local store.
    #[error("configuration must not set both server_url and local")]
    BothLocations,

    /// The configuration specifies the server URL as an empty string.
    #[error("server_url is empty")]
    ServerUrlIsEmpty,

    /// The server URL is not an http: or https: one.
    #[error("server URL doesn't use http or https: {0}")]
    NotHttp(String),

    /// The pool name is empty.
    #[error("pool name is empty")]
    PoolIsEmpty,

    /// The object name is empty.
    #[error("object name is empty")]
    ObjectIsEmpty,

    /// A zero timeout would fail every request.
    #[error("timeout must be at least one second")]
    ZeroTimeout,

    /// Error reading a configuation file.
    #[error("failed to read configuration file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    /// Error parsing configuration file as YAML.
    #[error("failed to parse configuration file {0} as YAML: {1}")]
    YamlParse(PathBuf, serde_yaml::Error),
}

fn expand_tilde(path: &Path) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            for comp in path.components().skip(1) {
                expanded.push(comp);
            }
            expanded
        } else {
            path.to_path_buf()
        }
    } else {
        path.to_path_buf()
    }
}
