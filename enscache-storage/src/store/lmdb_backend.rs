//! LMDB-backed key-value store.
//!
//! Uses the heed crate (Rust bindings for LMDB) as the persistent backend of
//! the versioned store. Values are opaque bytes; versioning and JSON live one
//! layer up in [`VersionedStore`](super::VersionedStore).
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get` and prefix scans
//! - One write transaction per `set`, `delete` and `delete_prefix`, so every
//!   write is atomic for its key
//! - Statistics are tracked with atomic counters

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use enscache_core::{EnsCacheError, EnsCacheResult, StorageError};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{KvBackend, StoreStats};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbError> for EnsCacheError {
    fn from(e: LmdbError) -> Self {
        EnsCacheError::Storage(StorageError::Backend {
            reason: e.to_string(),
        })
    }
}

fn txn_error(e: heed::Error) -> LmdbError {
    LmdbError::Transaction(e.to_string())
}

/// LMDB-backed persistent store.
///
/// # Example
///
/// ```ignore
/// use enscache_storage::{LmdbBackend, VersionedStore};
///
/// let backend = LmdbBackend::new("/tmp/enscache", 64)?;
/// let store = VersionedStore::new(backend);
/// store.save("ens.avatar.nick.eth", &avatar, "0.2.0").await?;
/// ```
pub struct LmdbBackend {
    env: Env,
    db: Database<Str, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    bytes_written: AtomicU64,
}

impl LmdbBackend {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB store");

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        })
    }

    fn collect_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, LmdbError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let iter = self.db.prefix_iter(&rtxn, prefix).map_err(txn_error)?;

        let mut keys = Vec::new();
        for result in iter {
            match result {
                Ok((key, _)) => keys.push(key.to_string()),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable LMDB entry");
                }
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl KvBackend for LmdbBackend {
    async fn get(&self, key: &str) -> EnsCacheResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        match self.db.get(&rtxn, key) {
            Ok(Some(bytes)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(bytes.to_vec()))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(txn_error(e).into())
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> EnsCacheResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.put(&mut wtxn, key, value).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.bytes_written
            .fetch_add(value.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> EnsCacheResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = self.db.delete(&mut wtxn, key).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> EnsCacheResult<Vec<String>> {
        Ok(self.collect_keys_with_prefix(prefix)?)
    }

    async fn delete_prefix(&self, prefix: &str) -> EnsCacheResult<u64> {
        let keys_to_delete = self.collect_keys_with_prefix(prefix)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let mut deleted = 0u64;
        for key in &keys_to_delete {
            if self.db.delete(&mut wtxn, key.as_str()).map_err(txn_error)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_error)?;

        Ok(deleted)
    }

    async fn stats(&self) -> EnsCacheResult<StoreStats> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_error)?;

        Ok(StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        })
    }
}

impl std::fmt::Debug for LmdbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbBackend")
            .field("path", &self.env.path())
            .finish()
    }
}
