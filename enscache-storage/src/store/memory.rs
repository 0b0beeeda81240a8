//! In-memory backend for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use enscache_core::{EnsCacheError, EnsCacheResult, StorageError};

use super::traits::{KvBackend, StoreStats};

/// HashMap-backed store.
///
/// Cloning yields another handle onto the same map. Reads and writes can be
/// made to fail on demand to exercise the fail-open paths of the layers above.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store raw bytes directly, bypassing failure injection.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), value.into());
        }
    }

    /// Raw bytes under `key`, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn injected(&self, flag: &AtomicBool, op: &str) -> EnsCacheResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(EnsCacheError::Storage(StorageError::Backend {
                reason: format!("injected {} failure", op),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> EnsCacheResult<Option<Vec<u8>>> {
        self.injected(&self.fail_reads, "read")?;
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        let value = entries.get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> EnsCacheResult<()> {
        self.injected(&self.fail_writes, "write")?;
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        self.bytes_written
            .fetch_add(value.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> EnsCacheResult<bool> {
        self.injected(&self.fail_writes, "write")?;
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> EnsCacheResult<Vec<String>> {
        self.injected(&self.fail_reads, "read")?;
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> EnsCacheResult<u64> {
        self.injected(&self.fail_writes, "write")?;
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self) -> EnsCacheResult<StoreStats> {
        Ok(StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_entries() {
        let backend = InMemoryBackend::new();
        let other = backend.clone();

        backend.set("k", b"v").await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
    }

    #[tokio::test]
    async fn test_injected_read_failure() {
        let backend = InMemoryBackend::new();
        backend.set("k", b"v").await.unwrap();

        backend.set_fail_reads(true);
        assert!(backend.get("k").await.is_err());

        backend.set_fail_reads(false);
        assert!(backend.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_injected_write_failure_leaves_value() {
        let backend = InMemoryBackend::new();
        backend.set("k", b"old").await.unwrap();

        backend.set_fail_writes(true);
        assert!(backend.set("k", b"new").await.is_err());
        assert_eq!(backend.raw("k").as_deref(), Some(&b"old"[..]));
    }

    #[tokio::test]
    async fn test_delete_prefix_counts() {
        let backend = InMemoryBackend::new();
        backend.insert_raw("ens.avatar.a.eth", "1");
        backend.insert_raw("ens.avatar.b.eth", "2");
        backend.insert_raw("ens.profile.a.eth", "3");

        assert_eq!(backend.delete_prefix("ens.avatar.").await.unwrap(), 2);
        assert_eq!(backend.len(), 1);
    }
}
