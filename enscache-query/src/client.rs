//! In-memory query cache with staleness windows and request deduplication.
//!
//! One [`QueryClient`] is constructed at startup and cloned into every
//! consumer; clones share the same entries. For each key the client
//! remembers the last data, when it was written, and the fetch currently in
//! flight, so that concurrent readers of the same key share one fetch.
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::new();
//!
//! // Runs the fetcher unless fresh data or an in-flight fetch exists
//! let value = client
//!     .fetch_query(QueryKey::ens_address(name), Duration::from_secs(10), || fetch(name))
//!     .await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use enscache_core::EnsCacheResult;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::freshness::{QuerySnapshot, QueryStatus};
use crate::query_key::QueryKey;

type SharedFetch = Shared<BoxFuture<'static, EnsCacheResult<Value>>>;

/// Value produced by a fetcher, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Answered by the remote source. Makes the entry fresh.
    Remote(Value),
    /// Served from local persistence without asking the remote source.
    /// Published to observers but never counted as fresh.
    Local(Value),
}

impl Fetched {
    pub fn into_value(self) -> Value {
        match self {
            Self::Remote(value) | Self::Local(value) => value,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

enum Begin {
    Fresh(Value),
    Pending(SharedFetch),
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

struct QueryEntry {
    snapshot: QuerySnapshot,
    in_flight: Option<InFlight>,
    tx: watch::Sender<QuerySnapshot>,
}

impl QueryEntry {
    fn new() -> Self {
        let (tx, _) = watch::channel(QuerySnapshot::default());
        Self {
            snapshot: QuerySnapshot::default(),
            in_flight: None,
            tx,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot.clone());
    }

    fn write_data(&mut self, value: Value) {
        self.snapshot.data = Some(value);
        self.snapshot.updated_at = Some(Utc::now());
        self.snapshot.status = QueryStatus::Success;
        self.snapshot.error = None;
        self.snapshot.is_invalidated = false;
    }
}

/// Shared in-memory query cache. Cheap to clone.
#[derive(Clone, Default)]
pub struct QueryClient {
    entries: Arc<Mutex<HashMap<QueryKey, QueryEntry>>>,
    next_fetch_id: Arc<AtomicU64>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries are only touched in short synchronous sections, so a
    /// poisoned lock still guards consistent data.
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, QueryEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish `value` for `key` to observers.
    ///
    /// The data is stamped as updated but not as fetched, so it never
    /// satisfies a later [`fetch_query`](Self::fetch_query) on its own.
    pub fn set_query_data(&self, key: &QueryKey, value: Value) {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(QueryEntry::new);
        entry.write_data(value);
        entry.publish();
        tracing::trace!(key = %key, "Query data set");
    }

    /// Last data published for `key`, fresh or not.
    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.entries()
            .get(key)
            .and_then(|entry| entry.snapshot.data.clone())
    }

    /// Current state of `key`, if the client has ever seen it.
    pub fn snapshot(&self, key: &QueryKey) -> Option<QuerySnapshot> {
        self.entries().get(key).map(|entry| entry.snapshot.clone())
    }

    /// Watch `key` for changes. The receiver starts at the current state.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QuerySnapshot> {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(QueryEntry::new);
        let rx = entry.tx.subscribe();
        // Keep the channel value in step for late subscribers.
        entry.publish();
        rx
    }

    /// Mark `key` stale so the next fetch goes through the fetcher.
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.snapshot.is_invalidated = true;
            entry.publish();
        }
    }

    /// Forget `key` entirely. Subscribers see their channel close.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `key` through the cache.
    ///
    /// - Data fetched from the remote source less than `stale_time` ago is
    ///   returned without calling `fetcher`.
    /// - Otherwise, if a fetch for `key` is already running, its result is shared.
    /// - Otherwise `fetcher` runs; its result is written to the entry.
    ///
    /// A failed fetch records the error but keeps earlier data and leaves the
    /// key usable for the next call. When overlapping fetches both complete,
    /// the one completing last wins.
    ///
    /// `fetcher` is called while the cache is locked; it must only build its
    /// future and leave the work to the future itself. Inside a tokio runtime
    /// the fetch runs on its own task, so it completes even if every caller
    /// waiting on it is dropped.
    pub async fn fetch_query<F, Fut>(
        &self,
        key: QueryKey,
        stale_time: Duration,
        fetcher: F,
    ) -> EnsCacheResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EnsCacheResult<Fetched>> + Send + 'static,
    {
        match self.begin_fetch(key, stale_time, fetcher) {
            Begin::Fresh(data) => Ok(data),
            Begin::Pending(fetch) => fetch.await,
        }
    }

    /// Run [`fetch_query`](Self::fetch_query) in the background.
    ///
    /// The fetch is registered before this returns, so subscribers already
    /// see it in flight. Errors are logged and dropped. Dropping the handle
    /// detaches the task. Must be called from within a tokio runtime.
    pub fn prefetch_query<F, Fut>(
        &self,
        key: QueryKey,
        stale_time: Duration,
        fetcher: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EnsCacheResult<Fetched>> + Send + 'static,
    {
        let begin = self.begin_fetch(key.clone(), stale_time, fetcher);
        tokio::spawn(async move {
            if let Begin::Pending(fetch) = begin {
                if let Err(e) = fetch.await {
                    tracing::debug!(key = %key, error = %e, "Prefetch failed");
                }
            }
        })
    }

    fn begin_fetch<F, Fut>(&self, key: QueryKey, stale_time: Duration, fetcher: F) -> Begin
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EnsCacheResult<Fetched>> + Send + 'static,
    {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(QueryEntry::new);
        entry.snapshot.stale_time = stale_time;

        if entry.snapshot.is_fresh_at(Utc::now(), stale_time) {
            if let Some(data) = entry.snapshot.data.clone() {
                tracing::trace!(key = %key, "Serving fresh query data");
                return Begin::Fresh(data);
            }
        }

        if let Some(in_flight) = &entry.in_flight {
            tracing::trace!(key = %key, fetch_id = in_flight.id, "Joining in-flight fetch");
            return Begin::Pending(in_flight.fetch.clone());
        }

        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, fetch_id = id, "Starting fetch");
        let fetch = self
            .settle_when_done(key, id, fetcher())
            .boxed()
            .shared();
        entry.in_flight = Some(InFlight {
            id,
            fetch: fetch.clone(),
        });
        entry.snapshot.is_fetching = true;
        if entry.snapshot.data.is_none() {
            entry.snapshot.status = QueryStatus::Loading;
        }
        entry.publish();

        if let Ok(handle) = Handle::try_current() {
            let driver = fetch.clone();
            handle.spawn(async move {
                // Outcome is recorded by `settle`; callers read it from the shared future.
                let _ = driver.await;
            });
        }
        Begin::Pending(fetch)
    }

    fn settle_when_done<Fut>(
        &self,
        key: QueryKey,
        id: u64,
        fetch: Fut,
    ) -> impl Future<Output = EnsCacheResult<Value>> + Send + 'static
    where
        Fut: Future<Output = EnsCacheResult<Fetched>> + Send + 'static,
    {
        let client = self.clone();
        async move {
            let result = fetch.await;
            client.settle(&key, id, &result);
            result.map(Fetched::into_value)
        }
    }

    fn settle(&self, key: &QueryKey, id: u64, result: &EnsCacheResult<Fetched>) {
        let mut entries = self.entries();
        // Entry may have been removed while the fetch ran.
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        if entry.in_flight.as_ref().map(|f| f.id) == Some(id) {
            entry.in_flight = None;
            entry.snapshot.is_fetching = false;
        }

        match result {
            Ok(fetched) => {
                entry.write_data(fetched.clone().into_value());
                if fetched.is_remote() {
                    entry.snapshot.fetched_at = entry.snapshot.updated_at;
                }
                tracing::debug!(
                    key = %key,
                    fetch_id = id,
                    remote = fetched.is_remote(),
                    "Fetch succeeded"
                );
            }
            Err(e) => {
                entry.snapshot.status = QueryStatus::Error;
                entry.snapshot.error = Some(e.clone());
                tracing::debug!(key = %key, fetch_id = id, error = %e, "Fetch failed");
            }
        }
        entry.publish();
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.len())
            .finish()
    }
}
