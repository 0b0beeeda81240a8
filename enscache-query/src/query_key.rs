//! Keys of the in-memory query cache.

use enscache_core::ImageKind;
use std::fmt;

/// Kind of entity a query resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    EnsAddress,
    EnsAvatar,
    EnsHeader,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnsAddress => "ens-address",
            Self::EnsAvatar => "ens-avatar",
            Self::EnsHeader => "ens-header",
        }
    }

    pub fn for_image(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Avatar => Self::EnsAvatar,
            ImageKind::Header => Self::EnsHeader,
        }
    }
}

/// `(kind, name)` identifying one query-cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    kind: QueryKind,
    name: String,
}

impl QueryKey {
    pub fn new(kind: QueryKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn ens_address(name: impl Into<String>) -> Self {
        Self::new(QueryKind::EnsAddress, name)
    }

    pub fn ens_avatar(name: impl Into<String>) -> Self {
        Self::new(QueryKind::EnsAvatar, name)
    }

    pub fn ens_image(kind: ImageKind, name: impl Into<String>) -> Self {
        Self::new(QueryKind::for_image(kind), name)
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)
    }
}
