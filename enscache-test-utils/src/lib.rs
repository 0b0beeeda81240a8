//! ENSCACHE Test Utilities
//!
//! Shared test infrastructure for the ENSCACHE workspace:
//! - A counting, failure-injecting mock resolver
//! - Proptest generators for names, data types and payloads
//! - Fixtures for common stores and profiles

// Re-export the in-memory backend from its source crate
pub use enscache_storage::{EnsStore, InMemoryBackend, VersionedStore};

pub use enscache_core::{
    EnsCacheError, EnsCacheResult, EnsDataType, EnsImage, EnsProfile, EnsResolver, ImageKind,
    PrimaryAddress,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

// ============================================================================
// MOCK RESOLVER
// ============================================================================

/// In-memory resolver that counts calls.
///
/// Unknown names resolve to empty answers (`address: None`,
/// `imageUrl: None`), matching a resolver that knows the name has nothing set.
#[derive(Debug, Default)]
pub struct MockResolver {
    addresses: RwLock<HashMap<String, String>>,
    images: RwLock<HashMap<(ImageKind, String), String>>,
    primary_calls: AtomicUsize,
    image_calls: AtomicUsize,
    failing: AtomicBool,
    latency: RwLock<Duration>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(self, name: &str, address: &str) -> Self {
        self.set_address(name, address);
        self
    }

    pub fn with_image(self, kind: ImageKind, name: &str, url: &str) -> Self {
        self.set_image(kind, name, url);
        self
    }

    /// Delay every answer by `latency`, keeping requests in flight.
    pub fn with_latency(self, latency: Duration) -> Self {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
        self
    }

    pub fn set_address(&self, name: &str, address: &str) {
        if let Ok(mut addresses) = self.addresses.write() {
            addresses.insert(name.to_string(), address.to_string());
        }
    }

    pub fn set_image(&self, kind: ImageKind, name: &str, url: &str) {
        if let Ok(mut images) = self.images.write() {
            images.insert((kind, name.to_string()), url.to_string());
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `fetch_primary` calls so far.
    pub fn primary_calls(&self) -> usize {
        self.primary_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_image` calls so far.
    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.primary_calls() + self.image_calls()
    }

    async fn simulate(&self) -> EnsCacheResult<()> {
        let latency = self.latency.read().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(enscache_core::request_failed("mock", 503, "resolver unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl EnsResolver for MockResolver {
    async fn fetch_primary(&self, name: &str) -> EnsCacheResult<PrimaryAddress> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        let address = self
            .addresses
            .read()
            .ok()
            .and_then(|a| a.get(name).cloned());
        Ok(PrimaryAddress { address })
    }

    async fn fetch_image(&self, kind: ImageKind, name: &str) -> EnsCacheResult<EnsImage> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        let image_url = self
            .images
            .read()
            .ok()
            .and_then(|i| i.get(&(kind, name.to_string())).cloned());
        Ok(EnsImage { image_url })
    }

    fn resolver_id(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for ENS inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a plausible ENS name, optionally with subdomains.
    pub fn arb_ens_name() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9-]{0,14}(\\.[a-z0-9]{1,8}){0,2}\\.eth"
    }

    /// Generate any ENS data type.
    pub fn arb_data_type() -> impl Strategy<Value = EnsDataType> {
        (0usize..EnsDataType::ALL.len()).prop_map(|i| EnsDataType::ALL[i])
    }

    /// Generate a checksum-free hex address.
    pub fn arb_address() -> impl Strategy<Value = String> {
        "0x[0-9a-f]{40}"
    }

    /// Generate an image answer, sometimes empty.
    pub fn arb_image() -> impl Strategy<Value = EnsImage> {
        proptest::option::of("https://[a-z]{3,10}\\.xyz/[a-z0-9]{1,12}\\.png")
            .prop_map(|image_url| EnsImage { image_url })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made stores and payloads.

    use super::*;

    pub const NICK: &str = "nick.eth";
    pub const VITALIK: &str = "vitalik.eth";
    pub const VITALIK_ADDRESS: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    pub const NICK_AVATAR_URL: &str = "https://x/y.png";

    /// ENS accessors over a fresh in-memory backend.
    ///
    /// Must be called inside a tokio runtime.
    pub fn memory_ens_store() -> (EnsStore, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let store = EnsStore::new(VersionedStore::new(backend.clone()))
            .expect("memory store should open inside a runtime");
        (store, backend)
    }

    /// Resolver that knows vitalik.eth's address and nick.eth's avatar.
    pub fn known_resolver() -> MockResolver {
        MockResolver::new()
            .with_address(VITALIK, VITALIK_ADDRESS)
            .with_image(ImageKind::Avatar, NICK, NICK_AVATAR_URL)
    }
}
