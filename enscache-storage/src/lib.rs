//! ENSCACHE Storage - Versioned Local Store and ENS Accessors
//!
//! Persists ENS data under namespaced, version-tagged keys. The
//! [`VersionedStore`] sits on a pluggable [`KvBackend`] (LMDB in production,
//! in-memory for tests); [`EnsStore`] layers the typed ENS accessors and the
//! fire-and-forget write queue on top.

pub mod ens;
pub mod store;
pub mod write_queue;

pub use ens::EnsStore;
pub use store::{
    encode_entry, InMemoryBackend, KvBackend, LmdbBackend, LmdbError, StorageKey, StoreStats,
    VersionedEntry, VersionedStore,
};
pub use write_queue::WriteQueue;

use enscache_core::{EnsCacheConfig, EnsCacheResult};

/// Open the LMDB store described by `config` and wrap it in ENS accessors.
///
/// Must be called from within a tokio runtime (the write worker is spawned
/// on it).
pub fn open_ens_store(config: &EnsCacheConfig) -> EnsCacheResult<EnsStore> {
    config.validate()?;
    let backend = LmdbBackend::new(&config.store_path, config.map_size_mb)?;
    EnsStore::with_version(VersionedStore::new(backend), config.profile_version.clone())
}
