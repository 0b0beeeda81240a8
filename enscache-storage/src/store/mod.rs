//! Versioned local store.
//!
//! A generic key-value persistence layer: namespaced string keys, each value
//! tagged with a version. Reads that expect a different version than the one
//! stored see nothing, so partially-trusted data never reaches a caller.
//!
//! # Example
//!
//! ```ignore
//! let store = VersionedStore::new(LmdbBackend::new(path, 64)?);
//! store.save("ens.avatar.nick.eth", &avatar, "0.2.0").await?;
//!
//! // Fails open: absent, unreadable or mismatched entries yield the default
//! let cached: Option<EnsImage> = store.get("ens.avatar.nick.eth", None, "0.2.0").await;
//! ```

pub mod keys;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;
pub mod versioned;

pub use keys::StorageKey;
pub use lmdb_backend::{LmdbBackend, LmdbError};
pub use memory::InMemoryBackend;
pub use traits::{KvBackend, StoreStats};
pub use versioned::{encode_entry, VersionedEntry, VersionedStore};
