//! Key-value backend trait and store statistics.

use async_trait::async_trait;
use enscache_core::EnsCacheResult;

/// Persistent key-value backend underneath the versioned store.
///
/// Backends store opaque bytes under string keys. A `set` must be atomic
/// with respect to its key: readers observe either the previous value or the
/// new one, never a partial write.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read the bytes stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> EnsCacheResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> EnsCacheResult<()>;

    /// Delete `key`. Returns whether a value was removed.
    async fn delete(&self, key: &str) -> EnsCacheResult<bool>;

    /// List every key starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> EnsCacheResult<Vec<String>>;

    /// Delete every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> EnsCacheResult<u64>;

    /// Get backend statistics.
    async fn stats(&self) -> EnsCacheResult<StoreStats>;
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Reads that found a value.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Number of entries currently stored.
    pub entry_count: u64,
    /// Bytes written since the backend was opened.
    pub bytes_written: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_stats_hit_rate() {
        let stats = StoreStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = StoreStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
