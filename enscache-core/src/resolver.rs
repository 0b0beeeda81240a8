//! Remote ENS resolver abstraction.
//!
//! The query layer only ever talks to the network through this trait, so
//! tests can swap in a counting mock and the binary can plug in the HTTP
//! client.

use async_trait::async_trait;

use crate::{EnsCacheResult, EnsImage, ImageKind, PrimaryAddress};

/// Trait for remote ENS resolvers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EnsResolver: Send + Sync {
    /// Resolve the primary address of `name`.
    ///
    /// # Returns
    /// * `Ok(PrimaryAddress)` - `address` is `None` when the name has no address set
    /// * `Err(EnsCacheError::Resolver)` - If the lookup fails
    async fn fetch_primary(&self, name: &str) -> EnsCacheResult<PrimaryAddress>;

    /// Resolve the image of the given kind for `name`.
    async fn fetch_image(&self, kind: ImageKind, name: &str) -> EnsCacheResult<EnsImage>;

    /// Identifier used in logs and error messages.
    fn resolver_id(&self) -> &str;
}
