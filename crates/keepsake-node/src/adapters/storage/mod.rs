//! # Storage Backends
//!
//! Opens the one `SharedKvStore` every subsystem repository writes through.
//!
//! | Backend  | Durable | Notes |
//! |----------|---------|-------|
//! | memory   | no      | tests and demos |
//! | file     | yes     | snapshot file `keepsake.db` under the data dir |
//! | rocksdb  | yes     | `rocksdb` feature, directory `rocksdb/` under the data dir |
//!
//! Durable backends take an exclusive lock on `<data_dir>/LOCK` first, so
//! two engines can never drive the same messages.

mod lock;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

pub use lock::DataDirLock;
#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

use crate::container::config::{StorageBackend, StorageConfig};
use shared_types::storage::{shared, SharedKvStore};
use shared_types::{FileBackedKVStore, InMemoryKVStore, KVStoreError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// File name of the file-backed snapshot.
pub const SNAPSHOT_FILE: &str = "keepsake.db";

#[derive(Debug, Error)]
pub enum StorageSetupError {
    #[error("data directory {path} is locked by another process")]
    Locked { path: PathBuf },

    #[error("cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store failed to open: {0}")]
    Store(#[from] KVStoreError),

    #[error("backend {0:?} is not compiled into this binary")]
    BackendUnavailable(StorageBackend),
}

/// An open store plus the lock that must live as long as it does.
pub struct OpenedStore {
    pub store: SharedKvStore,
    pub lock: Option<DataDirLock>,
}

/// Open the configured backend.
pub fn open_store(config: &StorageConfig) -> Result<OpenedStore, StorageSetupError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("[ks-node] using in-memory store; nothing survives a restart");
            Ok(OpenedStore {
                store: shared(InMemoryKVStore::new()),
                lock: None,
            })
        }
        StorageBackend::File => {
            let lock = DataDirLock::acquire(&config.data_dir)?;
            let path = config.data_dir.join(SNAPSHOT_FILE);
            let store = FileBackedKVStore::open(&path)?;
            info!(path = %path.display(), "[ks-node] file-backed store ready");
            Ok(OpenedStore {
                store: shared(store),
                lock: Some(lock),
            })
        }
        StorageBackend::RocksDb => open_rocksdb(config),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &StorageConfig) -> Result<OpenedStore, StorageSetupError> {
    let lock = DataDirLock::acquire(&config.data_dir)?;
    let path = config.data_dir.join("rocksdb");
    let store = RocksDbStore::open(RocksDbConfig {
        path: path.to_string_lossy().to_string(),
        ..RocksDbConfig::default()
    })?;
    info!(path = %path.display(), "[ks-node] RocksDB store ready");
    Ok(OpenedStore {
        store: shared(store),
        lock: Some(lock),
    })
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(config: &StorageConfig) -> Result<OpenedStore, StorageSetupError> {
    Err(StorageSetupError::BackendUnavailable(config.backend))
}
