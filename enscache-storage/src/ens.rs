//! Typed accessors for persisted ENS data.
//!
//! Reads return `None` (or the documented default) on a miss. Writes are
//! fire-and-forget: the value is serialized immediately, handed to the
//! [`WriteQueue`], and the call returns without waiting for the backend.
//! Every read first drains the queue up to that point, so a caller always
//! observes its own earlier writes.

use enscache_core::{
    EnsCacheResult, EnsDataType, EnsDomain, EnsProfile, ENS_PROFILE_VERSION,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::store::{encode_entry, StorageKey, StoreStats, VersionedStore};
use crate::write_queue::WriteQueue;

/// ENS data accessors over a versioned store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EnsStore {
    store: VersionedStore,
    queue: WriteQueue,
    version: String,
}

impl EnsStore {
    /// Create accessors and spawn their write worker on the current runtime.
    pub fn new(store: VersionedStore) -> EnsCacheResult<Self> {
        Self::with_version(store, ENS_PROFILE_VERSION)
    }

    /// Like [`EnsStore::new`] with a non-default version tag.
    pub fn with_version(store: VersionedStore, version: impl Into<String>) -> EnsCacheResult<Self> {
        let queue = WriteQueue::spawn(store.clone())?;
        Ok(Self {
            store,
            queue,
            version: version.into(),
        })
    }

    /// Version tag written with and required of every entry.
    pub fn version(&self) -> &str {
        &self.version
    }

    // === Generic data ===

    /// Cached value of `data_type` for `name`.
    pub async fn get_ens_data<T: DeserializeOwned>(
        &self,
        data_type: EnsDataType,
        name: &str,
    ) -> Option<T> {
        self.read(&StorageKey::data(data_type, name), None).await
    }

    /// Queue `value` as the cached `data_type` for `name`.
    pub fn save_ens_data<T: Serialize + ?Sized>(
        &self,
        data_type: EnsDataType,
        name: &str,
        value: &T,
    ) -> EnsCacheResult<()> {
        self.write(StorageKey::data(data_type, name), value)
    }

    /// Remove the cached `data_type` for `name`. Waits for the removal.
    pub async fn remove_ens_data(&self, data_type: EnsDataType, name: &str) -> EnsCacheResult<bool> {
        self.queue.flush().await?;
        self.store
            .remove(&StorageKey::data(data_type, name).encode())
            .await
    }

    /// Drop every cached entry of `data_type`. Returns the number removed.
    pub async fn invalidate_data_type(&self, data_type: EnsDataType) -> EnsCacheResult<u64> {
        self.queue.flush().await?;
        let removed = self
            .store
            .remove_prefix(&StorageKey::data_type_prefix(data_type))
            .await?;
        tracing::info!(data_type = %data_type, removed, "Invalidated ENS data type");
        Ok(removed)
    }

    /// Names with an entry (of any version) stored for `data_type`.
    pub async fn cached_names(&self, data_type: EnsDataType) -> EnsCacheResult<Vec<String>> {
        self.queue.flush().await?;
        let keys = self
            .store
            .keys_with_prefix(&StorageKey::data_type_prefix(data_type))
            .await?;
        let mut names: Vec<String> = keys
            .iter()
            .filter_map(|k| match StorageKey::decode(k) {
                Some(StorageKey::Data { name, .. }) => Some(name),
                _ => None,
            })
            .collect();
        names.sort();
        Ok(names)
    }

    // === Profiles ===

    pub async fn get_ens_profile(&self, name: &str) -> Option<EnsProfile> {
        self.read(&StorageKey::profile(name), None).await
    }

    pub fn save_ens_profile(&self, name: &str, profile: &EnsProfile) -> EnsCacheResult<()> {
        self.write(StorageKey::profile(name), profile)
    }

    // === Domains by owning account ===

    pub async fn get_ens_domains(&self, account: &str) -> Option<Vec<EnsDomain>> {
        self.read(&StorageKey::domains(account), None).await
    }

    pub fn set_ens_domains(&self, account: &str, domains: &[EnsDomain]) -> EnsCacheResult<()> {
        self.write(StorageKey::domains(account), domains)
    }

    // === Onchain data disclaimer ===

    /// Whether the user has dismissed the onchain-data disclaimer. Defaults to `false`.
    pub async fn get_seen_onchain_data_disclaimer(&self) -> bool {
        self.read(&StorageKey::SeenOnchainDisclaimer, false).await
    }

    pub fn save_seen_onchain_data_disclaimer(&self, seen: bool) -> EnsCacheResult<()> {
        self.write(StorageKey::SeenOnchainDisclaimer, &seen)
    }

    // === Labelhash reverse mapping ===

    pub async fn get_name_from_labelhash(&self, labelhash: &str) -> Option<String> {
        self.read(&StorageKey::labelhash(labelhash), None).await
    }

    pub fn save_name_from_labelhash(&self, labelhash: &str, name: &str) -> EnsCacheResult<()> {
        self.write(StorageKey::labelhash(labelhash), name)
    }

    // === Maintenance ===

    /// Wait until every write queued so far has reached the backend.
    pub async fn flush(&self) -> EnsCacheResult<()> {
        self.queue.flush().await
    }

    /// Number of queued writes the backend rejected.
    pub fn failed_writes(&self) -> u64 {
        self.queue.failed_writes()
    }

    pub async fn stats(&self) -> EnsCacheResult<StoreStats> {
        self.store.stats().await
    }

    async fn read<T: DeserializeOwned>(&self, key: &StorageKey, default: T) -> T {
        if let Err(e) = self.queue.flush().await {
            tracing::debug!(key = %key, error = %e, "Reading without draining write queue");
        }
        self.store.get(&key.encode(), default, &self.version).await
    }

    fn write<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> EnsCacheResult<()> {
        let key = key.encode();
        let bytes = encode_entry(&key, value, &self.version)?;
        self.queue.enqueue(key, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;
    use enscache_core::{DomainOwner, EnsImage, PrimaryAddress};
    use serde_json::json;

    fn make_store() -> (EnsStore, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let store = EnsStore::new(VersionedStore::new(backend.clone())).unwrap();
        (store, backend)
    }

    #[tokio::test]
    async fn test_avatar_roundtrip() {
        let (store, _) = make_store();
        store
            .save_ens_data(EnsDataType::Avatar, "nick.eth", &json!({ "imageUrl": "https://x/y.png" }))
            .unwrap();

        let avatar: Option<EnsImage> = store.get_ens_data(EnsDataType::Avatar, "nick.eth").await;
        assert_eq!(avatar, Some(EnsImage::new("https://x/y.png")));
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let (store, _) = make_store();
        let address: Option<PrimaryAddress> =
            store.get_ens_data(EnsDataType::Address, "nobody.eth").await;
        assert!(address.is_none());
    }

    #[tokio::test]
    async fn test_entries_carry_profile_version() {
        let (store, backend) = make_store();
        store
            .save_ens_data(EnsDataType::Owner, "nick.eth", "0xowner")
            .unwrap();
        store.flush().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&backend.raw("ens.owner.nick.eth").unwrap()).unwrap();
        assert_eq!(raw["version"], json!("0.2.0"));
    }

    #[tokio::test]
    async fn test_version_bump_invalidates() {
        let backend = InMemoryBackend::new();
        let old = EnsStore::with_version(VersionedStore::new(backend.clone()), "0.1.0").unwrap();
        old.save_ens_data(EnsDataType::Address, "nick.eth", &PrimaryAddress::new("0x1"))
            .unwrap();
        old.flush().await.unwrap();

        let current = EnsStore::new(VersionedStore::new(backend)).unwrap();
        let address: Option<PrimaryAddress> =
            current.get_ens_data(EnsDataType::Address, "nick.eth").await;
        assert!(address.is_none());
    }

    #[tokio::test]
    async fn test_disclaimer_defaults_false() {
        let (store, _) = make_store();
        assert!(!store.get_seen_onchain_data_disclaimer().await);

        store.save_seen_onchain_data_disclaimer(true).unwrap();
        assert!(store.get_seen_onchain_data_disclaimer().await);
    }

    #[tokio::test]
    async fn test_domains_roundtrip() {
        let (store, _) = make_store();
        let domains = vec![EnsDomain {
            name: "nick.eth".to_string(),
            owner: DomainOwner {
                id: "0xb8c2".to_string(),
            },
            labelhash: "0x5d5727".to_string(),
        }];
        store.set_ens_domains("0xb8c2", &domains).unwrap();

        assert_eq!(store.get_ens_domains("0xb8c2").await, Some(domains));
        assert_eq!(store.get_ens_domains("0xother").await, None);
    }

    #[tokio::test]
    async fn test_labelhash_mapping() {
        let (store, _) = make_store();
        store.save_name_from_labelhash("0x5d5727", "nick").unwrap();
        assert_eq!(
            store.get_name_from_labelhash("0x5d5727").await.as_deref(),
            Some("nick")
        );
    }

    #[tokio::test]
    async fn test_remove_and_invalidate() {
        let (store, _) = make_store();
        for name in ["a.eth", "b.eth"] {
            store
                .save_ens_data(EnsDataType::Header, name, &EnsImage::new("h"))
                .unwrap();
        }
        store
            .save_ens_data(EnsDataType::Avatar, "a.eth", &EnsImage::new("a"))
            .unwrap();

        assert_eq!(
            store.cached_names(EnsDataType::Header).await.unwrap(),
            vec!["a.eth".to_string(), "b.eth".to_string()]
        );

        assert!(store.remove_ens_data(EnsDataType::Header, "a.eth").await.unwrap());
        assert_eq!(store.invalidate_data_type(EnsDataType::Header).await.unwrap(), 1);

        let avatar: Option<EnsImage> = store.get_ens_data(EnsDataType::Avatar, "a.eth").await;
        assert!(avatar.is_some());
    }

    #[tokio::test]
    async fn test_write_failure_does_not_break_reads() {
        let (store, backend) = make_store();
        backend.set_fail_writes(true);
        store
            .save_ens_data(EnsDataType::Avatar, "nick.eth", &EnsImage::new("u"))
            .unwrap();

        let avatar: Option<EnsImage> = store.get_ens_data(EnsDataType::Avatar, "nick.eth").await;
        assert!(avatar.is_none());
        assert_eq!(store.failed_writes(), 1);
    }
}
