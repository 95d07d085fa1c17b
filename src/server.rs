//! The object store server: its configuration, HTTP API, and the
//! wire types shared with clients.

use crate::kvpair::Batch;
use crate::objectstore::{ObjectStore, ObjectStoreError};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::Filter;

/// An object store shared by all requests.
pub type SharedStore = Arc<Mutex<ObjectStore>>;

/// Configuration for `omapbench-server`.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on, as `host:port`.
    pub address: String,
    /// SQLite file holding the objects.
    pub data: PathBuf,
    /// Pools that clients may use. They are created on startup.
    pub pools: Vec<String>,
    /// TLS private key. Without a key and certificate, the server
    /// speaks plain HTTP.
    pub tls_key: Option<PathBuf>,
    /// TLS certificate.
    pub tls_cert: Option<PathBuf>,
}

/// Possible errors with server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    /// The store file's directory doesn't exist.
    #[error("Directory for object store {0} does not exist")]
    DataDirNotFound(PathBuf),

    /// No pools are configured.
    #[error("At least one pool must be configured")]
    NoPools,

    /// Only one of key and certificate was given.
    #[error("tls_key and tls_cert must be set together")]
    PartialTls,

    /// The TLS key file doesn't exist.
    #[error("TLS key {0} does not exist")]
    TlsKeyNotFound(PathBuf),

    /// The TLS certificate file doesn't exist.
    #[error("TLS certificate {0} does not exist")]
    TlsCertNotFound(PathBuf),

    /// The listen address resolves to nothing.
    #[error("server address can't be resolved")]
    BadServerAddress,

    /// Error reading the configuration file.
    #[error("failed to read configuration file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    /// Error parsing the configuration file as YAML.
    #[error("failed to parse configuration file {0} as YAML: {1}")]
    YamlParse(PathBuf, serde_yaml::Error),
}

impl ServerConfig {
    /// Read, parse, and check a server configuration file.
    pub fn read_config(filename: &Path) -> Result<Self, ServerConfigError> {
        let config = std::fs::read_to_string(filename)
            .map_err(|err| ServerConfigError::Read(filename.to_path_buf(), err))?;
        let config: Self = serde_yaml::from_str(&config)
            .map_err(|err| ServerConfigError::YamlParse(filename.to_path_buf(), err))?;
        config.check()?;
        Ok(config)
    }

    /// Check that the configuration makes sense.
    pub fn check(&self) -> Result<(), ServerConfigError> {
        if let Some(dir) = self.data.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                return Err(ServerConfigError::DataDirNotFound(dir.to_path_buf()));
            }
        }
        if self.pools.is_empty() || self.pools.iter().any(|pool| pool.is_empty()) {
            return Err(ServerConfigError::NoPools);
        }
        match (&self.tls_key, &self.tls_cert) {
            (Some(key), Some(cert)) => {
                if !key.exists() {
                    return Err(ServerConfigError::TlsKeyNotFound(key.clone()));
                }
                if !cert.exists() {
                    return Err(ServerConfigError::TlsCertNotFound(cert.clone()));
                }
            }
            (None, None) => (),
            _ => return Err(ServerConfigError::PartialTls),
        }
        Ok(())
    }
}

/// Response body for counting an object's map entries.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmapCount {
    /// Number of entries.
    pub count: u64,
}

/// Path of a pool in the HTTP API.
pub fn pool_path(pool: &str) -> String {
    format!("/v1/pools/{}", pool)
}

/// Path of an object in the HTTP API.
pub fn object_path(pool: &str, object: &str) -> String {
    format!("{}/objects/{}", pool_path(pool), object)
}

/// Path of an object's map in the HTTP API.
pub fn omap_path(pool: &str, object: &str) -> String {
    format!("{}/omap", object_path(pool, object))
}

/// All routes of the HTTP API, served from `store`.
pub fn routes(
    store: SharedStore,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let store = warp::any().map(move || Arc::clone(&store));

    let pool = warp::get()
        .and(warp::path("v1"))
        .and(warp::path("pools"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(store.clone())
        .and_then(open_pool);

    let write = warp::put()
        .and(warp::path("v1"))
        .and(warp::path("pools"))
        .and(warp::path::param())
        .and(warp::path("objects"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(store.clone())
        .and(warp::filters::body::bytes())
        .and_then(write_object);

    let remove = warp::delete()
        .and(warp::path("v1"))
        .and(warp::path("pools"))
        .and(warp::path::param())
        .and(warp::path("objects"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(store.clone())
        .and_then(remove_object);

    let omap_set = warp::post()
        .and(warp::path("v1"))
        .and(warp::path("pools"))
        .and(warp::path::param())
        .and(warp::path("objects"))
        .and(warp::path::param())
        .and(warp::path("omap"))
        .and(warp::path::end())
        .and(store.clone())
        .and(warp::filters::body::bytes())
        .and_then(set_omap);

    let omap_count = warp::get()
        .and(warp::path("v1"))
        .and(warp::path("pools"))
        .and(warp::path::param())
        .and(warp::path("objects"))
        .and(warp::path::param())
        .and(warp::path("omap"))
        .and(warp::path("count"))
        .and(warp::path::end())
        .and(store)
        .and_then(count_omap);

    pool.or(write).or(remove).or(omap_set).or(omap_count)
}

async fn open_pool(
    pool: String,
    store: SharedStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let store = store.lock().await;
    match store.has_pool(&pool) {
        Ok(true) => {
            info!("opened pool {}", pool);
            Ok(StoreResult::Done)
        }
        Ok(false) => {
            error!("no such pool: {}", pool);
            Ok(StoreResult::NotFound)
        }
        Err(e) => Ok(failure(&pool, e)),
    }
}

async fn write_object(
    pool: String,
    object: String,
    store: SharedStore,
    data: Bytes,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut store = store.lock().await;
    match store.write_full(&pool, &object, &data) {
        Ok(()) => {
            info!("wrote {} bytes to {}/{}", data.len(), pool, object);
            Ok(StoreResult::Done)
        }
        Err(e) => Ok(failure(&object, e)),
    }
}

async fn remove_object(
    pool: String,
    object: String,
    store: SharedStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut store = store.lock().await;
    match store.remove_object(&pool, &object) {
        Ok(()) => {
            info!("removed {}/{}", pool, object);
            Ok(StoreResult::Done)
        }
        Err(e) => Ok(failure(&object, e)),
    }
}

async fn set_omap(
    pool: String,
    object: String,
    store: SharedStore,
    body: Bytes,
) -> Result<impl warp::Reply, warp::Rejection> {
    let batch: Batch = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => {
            error!("omap batch body is bad: {}", e);
            return Ok(StoreResult::BadRequest);
        }
    };

    let mut store = store.lock().await;
    match store.omap_set(&pool, &object, &batch) {
        Ok(()) => {
            debug!("set {} omap entries on {}/{}", batch.len(), pool, object);
            Ok(StoreResult::Done)
        }
        Err(e) => Ok(failure(&object, e)),
    }
}

async fn count_omap(
    pool: String,
    object: String,
    store: SharedStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let store = store.lock().await;
    match store.has_pool(&pool) {
        Ok(true) => (),
        Ok(false) => return Ok(StoreResult::NotFound),
        Err(e) => return Ok(failure(&pool, e)),
    }
    match store.omap_len(&pool, &object) {
        Ok(count) => Ok(StoreResult::Counted(count)),
        Err(e) => Ok(failure(&object, e)),
    }
}

// Turn a store error into a response. A missing pool is the client's
// problem; anything else means nothing was stored.
fn failure(what: &str, err: ObjectStoreError) -> StoreResult {
    match err {
        ObjectStoreError::NoSuchPool(_) => {
            error!("{}: {}", what, err);
            StoreResult::NotFound
        }
        _ => {
            error!("{}: store failed: {}", what, err);
            StoreResult::InternalServerError
        }
    }
}

enum StoreResult {
    Done,
    Counted(u64),
    NotFound,
    BadRequest,
    InternalServerError,
}

impl warp::Reply for StoreResult {
    fn into_response(self) -> warp::reply::Response {
        match self {
            StoreResult::Done => status_response(StatusCode::OK),
            StoreResult::Counted(count) => match serde_json::to_string(&OmapCount { count }) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(_) => status_response(StatusCode::INTERNAL_SERVER_ERROR),
            },
            StoreResult::BadRequest => status_response(StatusCode::BAD_REQUEST),
            StoreResult::NotFound => status_response(StatusCode::NOT_FOUND),
            StoreResult::InternalServerError => status_response(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

// Construct a response with a JSON body.
fn json_response(status: StatusCode, json: String) -> warp::reply::Response {
    into_response(status, json.as_bytes(), "application/json")
}

// Construct a body-less response with just a status.
fn status_response(status: StatusCode) -> warp::reply::Response {
    into_response(status, b"", "text/plain")
}

// Construct a custom HTTP response.
//
// If constructing the response fails, return a bare internal server
// error.
fn into_response(status: StatusCode, body: &[u8], content_type: &str) -> warp::reply::Response {
    match response(status, body, content_type) {
        Ok(x) => x,
        Err(_) => {
            let mut r = warp::reply::Response::new(Vec::new().into());
            *r.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            r
        }
    }
}

// Construct a warp::reply::Response if possible.
fn response(
    status: StatusCode,
    body: &[u8],
    content_type: &str,
) -> Result<warp::reply::Response, warp::http::header::InvalidHeaderValue> {
    let mut r = warp::reply::Response::new(body.to_vec().into());
    r.headers_mut().insert(
        warp::http::header::CONTENT_TYPE,
        warp::http::header::HeaderValue::from_str(content_type)?,
    );
    *r.status_mut() = status;
    Ok(r)
}
