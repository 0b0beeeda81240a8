//! ENS fetch orchestration.
//!
//! Each entity (primary address, avatar, header) resolves the same way:
//!
//! 1. Read the persisted entry. If present, publish it to the query cache.
//! 2. If present and the caller asked for `cache_first`, stop there.
//! 3. Otherwise ask the resolver, queue the answer for persistence and return it.
//!
//! The whole flow runs inside [`QueryClient::fetch_query`], so callers asking
//! for the same entity within the stale window share one resolver call. Only
//! a resolver answer opens that window; a persisted value served to a
//! `cache_first` caller is visible to observers but leaves the next plain
//! fetch going to the resolver.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use enscache_core::{
    EnsCacheResult, EnsDataType, EnsImage, EnsResolver, ImageKind, PrimaryAddress, StorageError,
    DEFAULT_STALE_TIME,
};
use enscache_storage::EnsStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::{Fetched, QueryClient};
use crate::freshness::{FetchOptions, QueryResult, QuerySnapshot};
use crate::query_key::QueryKey;

/// Fetch functions for ENS entities over a store, a query cache and a resolver.
#[derive(Clone)]
pub struct EnsQueries {
    store: EnsStore,
    client: QueryClient,
    resolver: Arc<dyn EnsResolver>,
    stale_time: Duration,
}

impl EnsQueries {
    pub fn new(store: EnsStore, client: QueryClient, resolver: Arc<dyn EnsResolver>) -> Self {
        Self {
            store,
            client,
            resolver,
            stale_time: DEFAULT_STALE_TIME,
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn store(&self) -> &EnsStore {
        &self.store
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    // === Primary address ===

    /// Primary address of `name`, or `None` when it has none.
    pub async fn fetch_ens_address(
        &self,
        name: &str,
        options: FetchOptions,
    ) -> EnsCacheResult<Option<String>> {
        let key = QueryKey::ens_address(name);
        let this = self.clone();
        let owned = name.to_string();
        let result = self
            .client
            .fetch_query(key.clone(), self.stale_time, move || {
                this.load_address(owned, options.cache_first)
            })
            .await;
        settle_result(&key, result, options)
    }

    /// Warm the address of `name` in the background.
    pub fn prefetch_ens_address(&self, name: &str, options: FetchOptions) -> JoinHandle<()> {
        let this = self.clone();
        let owned = name.to_string();
        self.client
            .prefetch_query(QueryKey::ens_address(name), self.stale_time, move || {
                this.load_address(owned, options.cache_first)
            })
    }

    /// Observe the address of `name`, starting a fetch unless fresh data exists.
    pub fn use_ens_address(&self, name: &str, options: FetchOptions) -> QueryObserver<String> {
        let rx = self.client.subscribe(&QueryKey::ens_address(name));
        // Detached; the observer sees the outcome through `rx`.
        drop(self.prefetch_ens_address(name, options));
        QueryObserver::new(rx)
    }

    // === Images ===

    /// Avatar of `name`, or `None` when it has none.
    pub async fn fetch_ens_avatar(
        &self,
        name: &str,
        options: FetchOptions,
    ) -> EnsCacheResult<Option<EnsImage>> {
        self.fetch_ens_image(ImageKind::Avatar, name, options).await
    }

    /// Header image of `name`, or `None` when it has none.
    pub async fn fetch_ens_header(
        &self,
        name: &str,
        options: FetchOptions,
    ) -> EnsCacheResult<Option<EnsImage>> {
        self.fetch_ens_image(ImageKind::Header, name, options).await
    }

    pub fn prefetch_ens_avatar(&self, name: &str, options: FetchOptions) -> JoinHandle<()> {
        self.prefetch_ens_image(ImageKind::Avatar, name, options)
    }

    pub fn prefetch_ens_header(&self, name: &str, options: FetchOptions) -> JoinHandle<()> {
        self.prefetch_ens_image(ImageKind::Header, name, options)
    }

    pub fn use_ens_avatar(&self, name: &str, options: FetchOptions) -> QueryObserver<EnsImage> {
        self.use_ens_image(ImageKind::Avatar, name, options)
    }

    pub fn use_ens_header(&self, name: &str, options: FetchOptions) -> QueryObserver<EnsImage> {
        self.use_ens_image(ImageKind::Header, name, options)
    }

    async fn fetch_ens_image(
        &self,
        kind: ImageKind,
        name: &str,
        options: FetchOptions,
    ) -> EnsCacheResult<Option<EnsImage>> {
        let key = QueryKey::ens_image(kind, name);
        let this = self.clone();
        let owned = name.to_string();
        let result = self
            .client
            .fetch_query(key.clone(), self.stale_time, move || {
                this.load_image(kind, owned, options.cache_first)
            })
            .await;
        settle_result(&key, result, options)
    }

    fn prefetch_ens_image(&self, kind: ImageKind, name: &str, options: FetchOptions) -> JoinHandle<()> {
        let this = self.clone();
        let owned = name.to_string();
        self.client
            .prefetch_query(QueryKey::ens_image(kind, name), self.stale_time, move || {
                this.load_image(kind, owned, options.cache_first)
            })
    }

    fn use_ens_image(
        &self,
        kind: ImageKind,
        name: &str,
        options: FetchOptions,
    ) -> QueryObserver<EnsImage> {
        let rx = self.client.subscribe(&QueryKey::ens_image(kind, name));
        drop(self.prefetch_ens_image(kind, name, options));
        QueryObserver::new(rx)
    }

    // === Loaders ===

    async fn load_address(self, name: String, cache_first: bool) -> EnsCacheResult<Fetched> {
        let key = QueryKey::ens_address(name.as_str());

        if let Some(cached) = self
            .store
            .get_ens_data::<PrimaryAddress>(EnsDataType::Address, &name)
            .await
        {
            self.client
                .set_query_data(&key, Value::from(cached.address.clone()));
            if cache_first {
                tracing::debug!(key = %key, "Serving persisted address");
                return Ok(Fetched::Local(Value::from(cached.address)));
            }
        }

        let fetched = self.resolver.fetch_primary(&name).await?;
        self.persist(EnsDataType::Address, &name, &fetched);
        Ok(Fetched::Remote(Value::from(fetched.address)))
    }

    async fn load_image(
        self,
        kind: ImageKind,
        name: String,
        cache_first: bool,
    ) -> EnsCacheResult<Fetched> {
        let key = QueryKey::ens_image(kind, name.as_str());

        if let Some(cached) = self
            .store
            .get_ens_data::<EnsImage>(kind.data_type(), &name)
            .await
        {
            let value = to_value(&key, &cached)?;
            self.client.set_query_data(&key, value.clone());
            if cache_first {
                tracing::debug!(key = %key, "Serving persisted image");
                return Ok(Fetched::Local(value));
            }
        }

        let fetched = self.resolver.fetch_image(kind, &name).await?;
        self.persist(kind.data_type(), &name, &fetched);
        to_value(&key, &fetched).map(Fetched::Remote)
    }

    /// Queue a resolver answer for persistence. A failed hand-off only costs
    /// a future cache miss.
    fn persist<T: Serialize>(&self, data_type: EnsDataType, name: &str, value: &T) {
        if let Err(e) = self.store.save_ens_data(data_type, name, value) {
            tracing::warn!(data_type = %data_type, name, error = %e, "Failed to queue ENS data");
        }
    }
}

impl std::fmt::Debug for EnsQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsQueries")
            .field("store", &self.store)
            .field("client", &self.client)
            .field("resolver", &self.resolver.resolver_id())
            .field("stale_time", &self.stale_time)
            .finish()
    }
}

fn to_value<T: Serialize>(key: &QueryKey, value: &T) -> EnsCacheResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn from_value<T: DeserializeOwned>(key: &QueryKey, value: Value) -> EnsCacheResult<Option<T>> {
    serde_json::from_value(value).map_err(|e| {
        StorageError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn settle_result<T: DeserializeOwned>(
    key: &QueryKey,
    result: EnsCacheResult<Value>,
    options: FetchOptions,
) -> EnsCacheResult<Option<T>> {
    match result {
        Ok(value) => from_value(key, value),
        Err(e) if options.swallow_error => {
            tracing::warn!(key = %key, error = %e, "Swallowed ENS fetch error");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// OBSERVER
// ============================================================================

/// Live view of one ENS query.
///
/// Holds a subscription to the query cache entry. `current` reads the latest
/// state without waiting; `changed` and `settled` wait for updates.
#[derive(Debug)]
pub struct QueryObserver<T> {
    rx: watch::Receiver<QuerySnapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> QueryObserver<T> {
    fn new(rx: watch::Receiver<QuerySnapshot>) -> Self {
        Self {
            rx,
            _marker: PhantomData,
        }
    }

    pub fn current(&self) -> QueryResult<T> {
        self.rx.borrow().to_result()
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next update. `None` once the entry has been removed.
    pub async fn changed(&mut self) -> Option<QueryResult<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().to_result())
    }

    /// Wait until the entry holds a result with nothing in flight.
    pub async fn settled(&mut self) -> Option<QueryResult<T>> {
        let snapshot = self.rx.wait_for(QuerySnapshot::is_settled).await.ok()?;
        Some(snapshot.to_result())
    }
}
