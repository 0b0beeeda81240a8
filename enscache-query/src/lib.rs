//! ENSCACHE Query - Query Cache and ENS Fetch Orchestration
//!
//! [`QueryClient`] is the in-memory query cache shared by every consumer:
//! it tracks freshness per key and collapses concurrent fetches of the same
//! key into one. [`EnsQueries`] builds the ENS fetch flow on top of it,
//! combining the persisted [`EnsStore`](enscache_storage::EnsStore) with a
//! remote [`EnsResolver`](enscache_core::EnsResolver).

pub mod client;
pub mod ens_queries;
pub mod freshness;
pub mod http;
pub mod query_key;
pub mod telemetry;

pub use client::{Fetched, QueryClient};
pub use ens_queries::{EnsQueries, QueryObserver};
pub use freshness::{FetchOptions, QueryResult, QuerySnapshot, QueryStatus};
pub use http::HttpEnsResolver;
pub use query_key::{QueryKey, QueryKind};
pub use telemetry::init_tracing;
