//! ENSCACHE Core - Entity Types
//!
//! Pure data structures shared by the storage and query crates: ENS data
//! categories, resolver payloads, profile blobs, errors and configuration.
//! This crate contains no I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod resolver;

pub use config::EnsCacheConfig;
pub use error::{
    invalid_response, request_failed, ConfigError, EnsCacheError, EnsCacheResult, ResolverError,
    StorageError,
};
pub use resolver::EnsResolver;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Schema version attached to every ENS-namespaced entry.
///
/// Bumping this string invalidates everything persisted under the old value.
pub const ENS_PROFILE_VERSION: &str = "0.2.0";

/// Staleness window for ENS queries. Collapses duplicate requests for the
/// same name issued by several consumers at once.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(10);

// ============================================================================
// ENUMS
// ============================================================================

/// Category of ENS data persisted under `ens.<dataType>.<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnsDataType {
    Avatar,
    Header,
    Registrant,
    Owner,
    Address,
    Records,
    Resolver,
    FirstTxTimestamp,
}

impl EnsDataType {
    /// Every data type, in declaration order.
    pub const ALL: [EnsDataType; 8] = [
        EnsDataType::Avatar,
        EnsDataType::Header,
        EnsDataType::Registrant,
        EnsDataType::Owner,
        EnsDataType::Address,
        EnsDataType::Records,
        EnsDataType::Resolver,
        EnsDataType::FirstTxTimestamp,
    ];

    /// Wire name used inside persisted keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Header => "header",
            Self::Registrant => "registrant",
            Self::Owner => "owner",
            Self::Address => "address",
            Self::Records => "records",
            Self::Resolver => "resolver",
            Self::FirstTxTimestamp => "firstTxTimestamp",
        }
    }
}

impl fmt::Display for EnsDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnsDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown ENS data type: {}", s))
    }
}

/// Image slots an ENS name can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageKind {
    Avatar,
    Header,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Header => "header",
        }
    }

    /// Data type the image is persisted under.
    pub fn data_type(&self) -> EnsDataType {
        match self {
            Self::Avatar => EnsDataType::Avatar,
            Self::Header => EnsDataType::Header,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RESOLVER PAYLOADS
// ============================================================================

/// Primary address a name resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryAddress {
    pub address: Option<String>,
}

impl PrimaryAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
        }
    }
}

/// Image reference returned by the resolver for an avatar or header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsImage {
    pub image_url: Option<String>,
}

impl EnsImage {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
        }
    }
}

// ============================================================================
// PROFILE TYPES
// ============================================================================

/// ENS text records keyed by record name (`avatar`, `description`, `com.twitter`, ...).
pub type EnsRecords = BTreeMap<String, String>;

/// Full profile blob cached under `ens.profile.<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsProfile {
    pub address: Option<String>,
    pub avatar: Option<EnsImage>,
    pub header: Option<EnsImage>,
    pub owner: Option<String>,
    pub registrant: Option<String>,
    pub resolver: Option<String>,
    #[serde(default)]
    pub records: EnsRecords,
    pub first_tx_timestamp: Option<i64>,
}

/// Account that owns a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOwner {
    pub id: String,
}

/// Domain registered to an account, cached under `ensDomains.<account>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsDomain {
    pub name: String,
    pub owner: DomainOwner,
    pub labelhash: String,
}

// ============================================================================
// TESTS
// ============================================================================
