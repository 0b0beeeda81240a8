//! End-to-end properties of the ENS fetch flow.

use std::sync::Arc;
use std::time::Duration;

use enscache_core::{EnsCacheConfig, EnsDataType, EnsImage, PrimaryAddress};
use enscache_query::{EnsQueries, FetchOptions, QueryClient, QueryKey, QueryStatus};
use enscache_storage::open_ens_store;
use enscache_test_utils::fixtures::{
    known_resolver, memory_ens_store, NICK, NICK_AVATAR_URL, VITALIK, VITALIK_ADDRESS,
};
use enscache_test_utils::generators::{arb_address, arb_ens_name, arb_image};
use enscache_test_utils::MockResolver;
use proptest::prelude::*;
use tempfile::TempDir;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime should build")
}

fn queries_with(resolver: &Arc<MockResolver>) -> EnsQueries {
    let (store, _) = memory_ens_store();
    EnsQueries::new(store, QueryClient::new(), resolver.clone())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A persisted avatar answers a cache-first fetch without a remote call.
    #[test]
    fn prop_cache_first_never_calls_resolver(name in arb_ens_name(), image in arb_image()) {
        let (avatar, calls) = runtime().block_on(async {
            let resolver = Arc::new(known_resolver());
            let queries = queries_with(&resolver);
            queries
                .store()
                .save_ens_data(EnsDataType::Avatar, &name, &image)
                .unwrap();
            let avatar = queries
                .fetch_ens_avatar(&name, FetchOptions::cache_first())
                .await
                .unwrap();
            (avatar, resolver.total_calls())
        });
        prop_assert_eq!(avatar, Some(image));
        prop_assert_eq!(calls, 0);
    }

    /// With swallow_error, a failing resolver yields an empty result.
    #[test]
    fn prop_swallow_error_yields_none(name in arb_ens_name()) {
        let (avatar, address) = runtime().block_on(async {
            let resolver = Arc::new(MockResolver::new());
            resolver.set_failing(true);
            let queries = queries_with(&resolver);
            let avatar = queries
                .fetch_ens_avatar(&name, FetchOptions::swallow_error())
                .await
                .unwrap();
            let address = queries
                .fetch_ens_address(&name, FetchOptions::swallow_error())
                .await
                .unwrap();
            (avatar, address)
        });
        prop_assert_eq!(avatar, None);
        prop_assert_eq!(address, None);
    }

    /// Concurrent address fetches of one name share a single remote call.
    #[test]
    fn prop_concurrent_fetches_dedupe(name in arb_ens_name(), address in arb_address()) {
        let (results, calls) = runtime().block_on(async {
            let resolver = Arc::new(
                MockResolver::new()
                    .with_address(&name, &address)
                    .with_latency(Duration::from_millis(5)),
            );
            let queries = queries_with(&resolver);
            let (a, b, c) = tokio::join!(
                queries.fetch_ens_address(&name, FetchOptions::default()),
                queries.fetch_ens_address(&name, FetchOptions::default()),
                queries.fetch_ens_address(&name, FetchOptions::default()),
            );
            (vec![a.unwrap(), b.unwrap(), c.unwrap()], resolver.primary_calls())
        });
        prop_assert!(results.iter().all(|r| r.as_deref() == Some(address.as_str())));
        prop_assert_eq!(calls, 1);
    }
}

#[tokio::test]
async fn test_vitalik_concurrent_callers_one_remote_call() {
    let resolver = Arc::new(known_resolver().with_latency(Duration::from_millis(20)));
    let queries = queries_with(&resolver);
    let other = queries.clone();

    let handle = tokio::spawn(async move {
        other
            .fetch_ens_address(VITALIK, FetchOptions::default())
            .await
    });
    let mine = queries
        .fetch_ens_address(VITALIK, FetchOptions::default())
        .await
        .unwrap();
    let theirs = handle.await.unwrap().unwrap();

    assert_eq!(mine.as_deref(), Some(VITALIK_ADDRESS));
    assert_eq!(theirs.as_deref(), Some(VITALIK_ADDRESS));
    assert_eq!(resolver.primary_calls(), 1);

    // Still inside the stale window: served from the query cache.
    queries
        .fetch_ens_address(VITALIK, FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(resolver.primary_calls(), 1);
}

#[tokio::test]
async fn test_stale_window_elapsed_refetches() {
    let resolver = Arc::new(known_resolver());
    let queries = queries_with(&resolver).with_stale_time(Duration::ZERO);

    for _ in 0..2 {
        queries
            .fetch_ens_address(VITALIK, FetchOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(resolver.primary_calls(), 2);
}

#[tokio::test]
async fn test_failure_does_not_poison_later_fetches() {
    let resolver = Arc::new(known_resolver());
    resolver.set_failing(true);
    let queries = queries_with(&resolver);

    assert!(queries
        .fetch_ens_avatar(NICK, FetchOptions::default())
        .await
        .is_err());
    let key = QueryKey::ens_avatar(NICK);
    assert_eq!(
        queries.client().snapshot(&key).unwrap().status,
        QueryStatus::Error
    );

    resolver.set_failing(false);
    let avatar = queries
        .fetch_ens_avatar(NICK, FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(avatar, Some(EnsImage::new(NICK_AVATAR_URL)));
    assert_eq!(resolver.image_calls(), 2);
}

#[tokio::test]
async fn test_persisted_value_published_before_refresh() {
    let resolver = Arc::new(known_resolver().with_latency(Duration::from_millis(50)));
    let queries = queries_with(&resolver);
    queries
        .store()
        .save_ens_data(EnsDataType::Address, VITALIK, &PrimaryAddress::new("0xcached"))
        .unwrap();

    let mut observer = queries.use_ens_address(VITALIK, FetchOptions::default());
    let first = loop {
        let result = observer.changed().await.expect("entry should stay alive");
        if result.data.is_some() {
            break result;
        }
    };
    assert_eq!(first.data.as_deref(), Some("0xcached"));
    assert!(first.is_fetching);

    let settled = observer.settled().await.unwrap();
    assert_eq!(settled.data.as_deref(), Some(VITALIK_ADDRESS));
}

#[tokio::test]
async fn test_lmdb_cache_serves_fresh_query_client() {
    let temp_dir = TempDir::new().expect("TempDir creation should succeed");
    let config = EnsCacheConfig::new()
        .with_store_path(temp_dir.path())
        .with_map_size_mb(10);
    let store = open_ens_store(&config).unwrap();

    let online = Arc::new(known_resolver());
    EnsQueries::new(store.clone(), QueryClient::new(), online.clone())
        .fetch_ens_avatar(NICK, FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(online.image_calls(), 1);

    // New in-memory cache, resolver down: the LMDB entry still answers.
    let offline = Arc::new(MockResolver::new());
    offline.set_failing(true);
    let avatar = EnsQueries::new(store, QueryClient::new(), offline.clone())
        .fetch_ens_avatar(NICK, FetchOptions::cache_first())
        .await
        .unwrap();
    assert_eq!(avatar, Some(EnsImage::new(NICK_AVATAR_URL)));
    assert_eq!(offline.image_calls(), 0);
}
