//! Versioned key-value store.
//!
//! Every value is wrapped in an envelope carrying a version tag. A read
//! names the version it expects; anything else under the key is treated as
//! absent. Bumping the expected version is the only invalidation mechanism,
//! there is no migration of old entries.

use std::sync::Arc;

use enscache_core::{EnsCacheResult, StorageError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::traits::{KvBackend, StoreStats};

/// Envelope persisted for every key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedEntry {
    pub value: serde_json::Value,
    pub version: String,
}

impl VersionedEntry {
    /// Whether this entry may be trusted by a reader expecting `version`.
    pub fn matches(&self, version: &str) -> bool {
        self.version == version
    }
}

/// Versioned JSON store over a [`KvBackend`]. Cloning shares the backend.
#[derive(Clone)]
pub struct VersionedStore {
    backend: Arc<dyn KvBackend>,
}

impl VersionedStore {
    pub fn new<B: KvBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Read the value under `key`.
    ///
    /// Fails open: returns `default` when the key is absent, the backend
    /// read fails, the envelope cannot be decoded, the stored version differs
    /// from `expected_version`, or the payload does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, default: T, expected_version: &str) -> T {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return default,
            Err(e) => {
                tracing::debug!(key, error = %e, "Store read failed, treating as miss");
                return default;
            }
        };

        let entry: VersionedEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key, error = %e, "Undecodable entry, treating as miss");
                return default;
            }
        };

        if !entry.matches(expected_version) {
            tracing::debug!(
                key,
                stored = %entry.version,
                expected = expected_version,
                "Version mismatch, treating as miss"
            );
            return default;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key, error = %e, "Payload does not match requested type");
                default
            }
        }
    }

    /// Serialize `value` and store it under `key` tagged with `version`,
    /// overwriting whatever was there.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        version: &str,
    ) -> EnsCacheResult<()> {
        let bytes = encode_entry(key, value, version)?;
        self.backend.set(key, &bytes).await
    }

    /// Store an already-encoded envelope.
    pub async fn save_encoded(&self, key: &str, bytes: &[u8]) -> EnsCacheResult<()> {
        self.backend.set(key, bytes).await
    }

    pub async fn remove(&self, key: &str) -> EnsCacheResult<bool> {
        self.backend.delete(key).await
    }

    pub async fn remove_prefix(&self, prefix: &str) -> EnsCacheResult<u64> {
        self.backend.delete_prefix(prefix).await
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> EnsCacheResult<Vec<String>> {
        self.backend.keys_with_prefix(prefix).await
    }

    pub async fn stats(&self) -> EnsCacheResult<StoreStats> {
        self.backend.stats().await
    }
}

/// Serialize `value` into the envelope bytes stored under `key`.
pub fn encode_entry<T: Serialize + ?Sized>(
    key: &str,
    value: &T,
    version: &str,
) -> EnsCacheResult<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    let entry = VersionedEntry {
        value,
        version: version.to_string(),
    };
    let bytes = serde_json::to_vec(&entry).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(bytes)
}

impl std::fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore").finish_non_exhaustive()
    }
}
