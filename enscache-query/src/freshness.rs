//! Freshness contracts for query reads.
//!
//! Callers state their staleness tolerance up front through
//! [`FetchOptions`], and every observation of the query cache comes back as
//! a [`QuerySnapshot`] that carries when its data was last updated.

use chrono::{DateTime, Utc};
use enscache_core::EnsCacheError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Per-call options for ENS fetches.
///
/// Both flags default to off: a plain fetch always goes to the resolver
/// (unless a fresh in-memory result exists) and surfaces remote failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Accept a locally persisted value without a remote refresh.
    ///
    /// The caller trades potentially stale data for zero network latency.
    pub cache_first: bool,
    /// Turn a remote failure into an empty result instead of an error.
    pub swallow_error: bool,
}

impl FetchOptions {
    pub fn cache_first() -> Self {
        Self {
            cache_first: true,
            ..Self::default()
        }
    }

    pub fn swallow_error() -> Self {
        Self {
            swallow_error: true,
            ..Self::default()
        }
    }

    pub fn with_cache_first(mut self, cache_first: bool) -> Self {
        self.cache_first = cache_first;
        self
    }

    pub fn with_swallow_error(mut self, swallow_error: bool) -> Self {
        self.swallow_error = swallow_error;
        self
    }
}

/// Lifecycle of a query key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched and nothing published.
    #[default]
    Idle,
    /// First fetch in progress, no data yet.
    Loading,
    /// Data available.
    Success,
    /// Last fetch failed. Previous data, if any, is kept.
    Error,
}

/// Point-in-time view of one query-cache entry.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    /// Last published data.
    pub data: Option<Value>,
    /// When `data` was last written, from any source.
    pub updated_at: Option<DateTime<Utc>>,
    /// When a fetch last answered from the remote source. Only this stamp
    /// makes an entry fresh; locally persisted data published on the way
    /// does not.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Staleness window requested by the most recent fetch.
    pub stale_time: Duration,
    pub status: QueryStatus,
    /// Error from the most recent failed fetch.
    pub error: Option<EnsCacheError>,
    /// A fetch is in flight.
    pub is_fetching: bool,
    /// Explicitly marked stale.
    pub is_invalidated: bool,
}

impl QuerySnapshot {
    /// How long ago the remote source last answered. Zero when it never has.
    pub fn staleness(&self) -> Duration {
        self.staleness_at(Utc::now())
    }

    fn staleness_at(&self, now: DateTime<Utc>) -> Duration {
        match self.fetched_at {
            Some(fetched_at) if now > fetched_at => {
                (now - fetched_at).to_std().unwrap_or(Duration::ZERO)
            }
            _ => Duration::ZERO,
        }
    }

    /// True while `now - fetched_at < stale_time` and the last fetch succeeded.
    pub fn is_fresh(&self, stale_time: Duration) -> bool {
        self.is_fresh_at(Utc::now(), stale_time)
    }

    pub(crate) fn is_fresh_at(&self, now: DateTime<Utc>, stale_time: Duration) -> bool {
        self.data.is_some()
            && self.fetched_at.is_some()
            && self.status == QueryStatus::Success
            && !self.is_invalidated
            && self.staleness_at(now) < stale_time
    }

    /// Whether the data was written at or after `timestamp`.
    pub fn is_fresh_as_of(&self, timestamp: DateTime<Utc>) -> bool {
        self.updated_at.map(|t| t >= timestamp).unwrap_or(false)
    }

    /// True once the entry holds a result and nothing is in flight.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && matches!(self.status, QueryStatus::Success | QueryStatus::Error)
    }

    /// Decode into the typed view handed to UI consumers.
    pub fn to_result<T: DeserializeOwned>(&self) -> QueryResult<T> {
        let data = self
            .data
            .clone()
            .and_then(|v| serde_json::from_value::<Option<T>>(v).ok().flatten());
        QueryResult {
            data,
            is_loading: self.status == QueryStatus::Loading,
            is_error: self.status == QueryStatus::Error,
            is_fetching: self.is_fetching,
            error: self.error.clone(),
        }
    }
}

/// `{ data, isLoading, isError }`-shaped result for UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_error: bool,
    pub is_fetching: bool,
    pub error: Option<EnsCacheError>,
}

impl<T> QueryResult<T> {
    pub fn map<U, F>(self, f: F) -> QueryResult<U>
    where
        F: FnOnce(T) -> U,
    {
        QueryResult {
            data: self.data.map(f),
            is_loading: self.is_loading,
            is_error: self.is_error,
            is_fetching: self.is_fetching,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_updated(ago: chrono::Duration) -> QuerySnapshot {
        let at = Utc::now() - ago;
        QuerySnapshot {
            data: Some(json!("0xabc")),
            updated_at: Some(at),
            fetched_at: Some(at),
            status: QueryStatus::Success,
            ..Default::default()
        }
    }

    #[test]
    fn test_fetch_options_defaults_off() {
        let options = FetchOptions::default();
        assert!(!options.cache_first);
        assert!(!options.swallow_error);

        let both = FetchOptions::cache_first().with_swallow_error(true);
        assert!(both.cache_first && both.swallow_error);
    }

    #[test]
    fn test_fresh_within_stale_time() {
        let snapshot = snapshot_updated(chrono::Duration::seconds(2));
        assert!(snapshot.is_fresh(Duration::from_secs(10)));
        assert!(!snapshot.is_fresh(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_stale_time_is_never_fresh() {
        let snapshot = snapshot_updated(chrono::Duration::zero());
        assert!(!snapshot.is_fresh(Duration::ZERO));
    }

    #[test]
    fn test_invalidated_is_not_fresh() {
        let mut snapshot = snapshot_updated(chrono::Duration::zero());
        snapshot.is_invalidated = true;
        assert!(!snapshot.is_fresh(Duration::from_secs(10)));
    }

    #[test]
    fn test_published_but_never_fetched_is_not_fresh() {
        let mut snapshot = snapshot_updated(chrono::Duration::zero());
        snapshot.fetched_at = None;
        assert!(!snapshot.is_fresh(Duration::from_secs(10)));
        assert_eq!(snapshot.staleness(), Duration::ZERO);
    }

    #[test]
    fn test_error_status_is_not_fresh() {
        let mut snapshot = snapshot_updated(chrono::Duration::zero());
        snapshot.status = QueryStatus::Error;
        assert!(!snapshot.is_fresh(Duration::from_secs(10)));
    }

    #[test]
    fn test_empty_snapshot_is_not_fresh() {
        let snapshot = QuerySnapshot::default();
        assert!(!snapshot.is_fresh(Duration::from_secs(10)));
        assert_eq!(snapshot.staleness(), Duration::ZERO);
        assert!(!snapshot.is_settled());
    }

    #[test]
    fn test_staleness() {
        let snapshot = snapshot_updated(chrono::Duration::seconds(5));
        let staleness = snapshot.staleness();
        assert!(staleness >= Duration::from_secs(4));
        assert!(staleness <= Duration::from_secs(10));
    }

    #[test]
    fn test_is_fresh_as_of() {
        let snapshot = snapshot_updated(chrono::Duration::zero());
        let updated_at = snapshot.updated_at.unwrap();

        assert!(snapshot.is_fresh_as_of(updated_at - chrono::Duration::seconds(10)));
        assert!(snapshot.is_fresh_as_of(updated_at));
        assert!(!snapshot.is_fresh_as_of(updated_at + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_to_result_decodes_and_flattens_null() {
        let snapshot = snapshot_updated(chrono::Duration::zero());
        let result: QueryResult<String> = snapshot.to_result();
        assert_eq!(result.data.as_deref(), Some("0xabc"));
        assert!(!result.is_loading && !result.is_error);

        let empty = QuerySnapshot {
            data: Some(Value::Null),
            status: QueryStatus::Success,
            ..Default::default()
        };
        assert_eq!(empty.to_result::<String>().data, None);
    }

    #[test]
    fn test_query_result_map() {
        let result = snapshot_updated(chrono::Duration::zero()).to_result::<String>();
        let mapped = result.map(|s| s.len());
        assert_eq!(mapped.data, Some(5));
    }
}
