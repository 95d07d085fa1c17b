//! Sessions with an object store.
//!
//! A session is a connected handle to a store plus a selected pool,
//! through which objects and their maps are written. The store may be
//! local, a SQLite file opened in this process, or remote, an
//! `omapbench-server` reached over HTTP. This module implements both.
//!
//! A session is released when it's closed or dropped, whichever
//! comes first, so every exit path from a run releases the store.

use crate::config::{ClusterConfig, StoreLocation};
use crate::kvpair::Batch;
use crate::objectstore::{ObjectStore, ObjectStoreError};
use crate::server::{object_path, omap_path, pool_path, OmapCount};

use log::{debug, error, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::path::Path;

/// The operations a benchmark needs from a store.
pub trait StorageSession {
    /// A prepared map write, ready to be applied.
    type WriteOp;

    /// Remove an object and its whole map, if it exists.
    fn remove_object(&mut self, object: &str) -> Result<(), SessionError>;

    /// Replace an object's data.
    fn write_object(&mut self, object: &str, payload: &[u8]) -> Result<(), SessionError>;

    /// Prepare a map write for a batch.
    fn create_write_op(&self, batch: Batch) -> Result<Self::WriteOp, SessionError>;

    /// Apply a prepared map write to an object, atomically.
    ///
    /// This blocks until the store has either stored every pair, or
    /// failed and stored none of them.
    fn operate(&mut self, object: &str, op: Self::WriteOp) -> Result<(), SessionError>;

    /// Write a batch into an object's map, atomically.
    fn atomic_map_write(&mut self, object: &str, batch: Batch) -> Result<(), SessionError> {
        let op = self.create_write_op(batch)?;
        self.operate(object, op)
    }

    /// Number of entries in an object's map.
    fn map_len(&self, object: &str) -> Result<u64, SessionError>;

    /// Release the session. Closing a closed session does nothing.
    fn close(&mut self);
}

/// Open a session with the store named in a configuration.
pub fn connect(config: &ClusterConfig) -> Result<Session, SessionError> {
    match &config.location {
        StoreLocation::Local(filename) => Ok(Session::Local(LocalSession::open(
            filename,
            &config.pool,
        )?)),
        StoreLocation::Remote(url) => Ok(Session::Remote(RemoteSession::connect(
            url, config,
        )?)),
    }
}

/// A session with a local or a remote store.
pub enum Session {
    /// A store file opened in this process.
    Local(LocalSession),

    /// A store behind an HTTP server.
    Remote(RemoteSession),
}

/// A map write prepared by a [`Session`].
pub enum SessionWriteOp {
    /// The pairs themselves, for a local store.
    Local(Batch),

    /// The encoded request body, for a remote store.
    Remote(Vec<u8>),
}

impl StorageSession for Session {
    type WriteOp = SessionWriteOp;

    fn remove_object(&mut self, object: &str) -> Result<(), SessionError> {
        match self {
            Self::Local(session) => session.remove_object(object),
            Self::Remote(session) => session.remove_object(object),
        }
    }

    fn write_object(&mut self, object: &str, payload: &[u8]) -> Result<(), SessionError> {
        match self {
            Self::Local(session) => session.write_object(object, payload),
            Self::Remote(session) => session.write_object(object, payload),
        }
    }

    fn create_write_op(&self, batch: Batch) -> Result<Self::WriteOp, SessionError> {
        match self {
            Self::Local(session) => session.create_write_op(batch).map(SessionWriteOp::Local),
            Self::Remote(session) => session.create_write_op(batch).map(SessionWriteOp::Remote),
        }
    }

    fn operate(&mut self, object: &str, op: Self::WriteOp) -> Result<(), SessionError> {
        match (self, op) {
            (Self::Local(session), SessionWriteOp::Local(op)) => session.operate(object, op),
            (Self::Remote(session), SessionWriteOp::Remote(op)) => session.operate(object, op),
            _ => Err(SessionError::ForeignWriteOp),
        }
    }

    fn map_len(&self, object: &str) -> Result<u64, SessionError> {
        match self {
            Self::Local(session) => session.map_len(object),
            Self::Remote(session) => session.map_len(object),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Local(session) => session.close(),
            Self::Remote(session) => session.close(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// A session with a store file opened in this process.
pub struct LocalSession {
    store: Option<ObjectStore>,
    pool: String,
}

impl LocalSession {
    /// Open a store file and select a pool, creating both if needed.
    pub fn open(filename: &Path, pool: &str) -> Result<Self, SessionError> {
        info!("opening local store {} pool {}", filename.display(), pool);
        let store = ObjectStore::open(filename).map_err(SessionError::OpenStore)?;
        store
            .create_pool(pool)
            .map_err(|err| SessionError::PoolOpen(pool.to_string(), err.to_string()))?;
        Ok(Self {
            store: Some(store),
            pool: pool.to_string(),
        })
    }

    fn store(&self) -> Result<&ObjectStore, SessionError> {
        self.store.as_ref().ok_or(SessionError::Closed)
    }

    fn store_mut(&mut self) -> Result<&mut ObjectStore, SessionError> {
        self.store.as_mut().ok_or(SessionError::Closed)
    }
}

impl StorageSession for LocalSession {
    type WriteOp = Batch;

    fn remove_object(&mut self, object: &str) -> Result<(), SessionError> {
        let pool = self.pool.clone();
        self.store_mut()?.remove_object(&pool, object)?;
        Ok(())
    }

    fn write_object(&mut self, object: &str, payload: &[u8]) -> Result<(), SessionError> {
        let pool = self.pool.clone();
        self.store_mut()?.write_full(&pool, object, payload)?;
        Ok(())
    }

    fn create_write_op(&self, batch: Batch) -> Result<Self::WriteOp, SessionError> {
        self.store()?;
        Ok(batch)
    }

    fn operate(&mut self, object: &str, op: Self::WriteOp) -> Result<(), SessionError> {
        let pool = self.pool.clone();
        self.store_mut()?.omap_set(&pool, object, &op)?;
        Ok(())
    }

    fn map_len(&self, object: &str) -> Result<u64, SessionError> {
        Ok(self.store()?.omap_len(&self.pool, object)?)
    }

    fn close(&mut self) {
        if let Some(store) = self.store.take() {
            let filename = store.filename().to_path_buf();
            match store.close() {
                Ok(()) => info!("closed local store {}", filename.display()),
                Err(err) => error!("closing local store {} failed: {}", filename.display(), err),
            }
        }
    }
}

/// A session with an `omapbench-server`.
pub struct RemoteSession {
    client: Option<Client>,
    base_url: String,
    pool: String,
}

impl RemoteSession {
    /// Connect to a server and check that the configured pool exists.
    pub fn connect(base_url: &str, config: &ClusterConfig) -> Result<Self, SessionError> {
        info!("connecting to {} pool {}", base_url, config.pool);
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls_cert)
            .timeout(config.timeout)
            .build()
            .map_err(SessionError::ClientBuild)?;
        let session = Self {
            client: Some(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            pool: config.pool.clone(),
        };

        let url = session.url(&pool_path(&session.pool));
        let res = session
            .client()?
            .get(&url)
            .send()
            .map_err(|err| SessionError::PoolOpen(session.pool.clone(), err.to_string()))?;
        if res.status() != StatusCode::OK {
            return Err(SessionError::PoolOpen(
                session.pool.clone(),
                format!("server answered {}", res.status()),
            ));
        }
        debug!("pool {} is open", session.pool);
        Ok(session)
    }

    fn client(&self) -> Result<&Client, SessionError> {
        self.client.as_ref().ok_or(SessionError::Closed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl StorageSession for RemoteSession {
    type WriteOp = Vec<u8>;

    fn remove_object(&mut self, object: &str) -> Result<(), SessionError> {
        let url = self.url(&object_path(&self.pool, object));
        debug!("DELETE {}", url);
        let res = self
            .client()?
            .delete(&url)
            .send()
            .map_err(SessionError::Request)?;
        check_status(&url, res.status())
    }

    fn write_object(&mut self, object: &str, payload: &[u8]) -> Result<(), SessionError> {
        let url = self.url(&object_path(&self.pool, object));
        debug!("PUT {}", url);
        let res = self
            .client()?
            .put(&url)
            .body(payload.to_vec())
            .send()
            .map_err(SessionError::Request)?;
        check_status(&url, res.status())
    }

    fn create_write_op(&self, batch: Batch) -> Result<Self::WriteOp, SessionError> {
        self.client()?;
        serde_json::to_vec(&batch).map_err(SessionError::EncodeBatch)
    }

    fn operate(&mut self, object: &str, op: Self::WriteOp) -> Result<(), SessionError> {
        let url = self.url(&omap_path(&self.pool, object));
        debug!("POST {}", url);
        let res = self
            .client()?
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(op)
            .send()
            .map_err(SessionError::Request)?;
        check_status(&url, res.status())
    }

    fn map_len(&self, object: &str) -> Result<u64, SessionError> {
        let url = self.url(&format!("{}/count", omap_path(&self.pool, object)));
        debug!("GET {}", url);
        let res = self
            .client()?
            .get(&url)
            .send()
            .map_err(SessionError::Request)?;
        check_status(&url, res.status())?;
        let count: OmapCount = res.json().map_err(SessionError::Request)?;
        Ok(count.count)
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            info!("closed session with {}", self.base_url);
        }
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), SessionError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SessionError::Rejected(url.to_string(), status))
    }
}

/// Possible errors from a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A local store couldn't be opened.
    #[error("cannot open local store: {0}")]
    OpenStore(#[source] ObjectStoreError),

    /// The HTTP client couldn't be created.
    #[error("cannot create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The pool couldn't be opened.
    #[error("cannot open pool {0}: {1}")]
    PoolOpen(String, String),

    /// An HTTP request failed before the server answered.
    #[error("request to object store failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The server refused a request.
    #[error("{0}: server answered {1}")]
    Rejected(String, StatusCode),

    /// The local store failed.
    #[error(transparent)]
    Store(#[from] ObjectStoreError),

    /// A batch couldn't be encoded for the server.
    #[error("cannot encode batch: {0}")]
    EncodeBatch(#[source] serde_json::Error),

    /// A write operation was applied to a different kind of session
    /// than the one that prepared it.
    #[error("write operation was prepared by another kind of session")]
    ForeignWriteOp,

    /// The session has been closed.
    #[error("session is closed")]
    Closed,
}
