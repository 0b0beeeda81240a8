//! Error types for ENS cache operations

use thiserror::Error;

/// Local storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend failed: {reason}")]
    Backend { reason: String },

    #[error("Failed to serialize value for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize value for {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Write queue is closed")]
    QueueClosed,

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Remote resolver errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Request to {resolver} failed with status {status}: {message}")]
    RequestFailed {
        resolver: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {resolver}: {reason}")]
    InvalidResponse { resolver: String, reason: String },

    #[error("Request to {resolver} timed out after {timeout_ms}ms")]
    Timeout { resolver: String, timeout_ms: u64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all ENS cache errors.
///
/// Every variant is `Clone` so a single in-flight fetch result can be handed
/// to every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnsCacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EnsCacheError {
    /// True when the failure came from the remote resolver.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Resolver(_))
    }
}

/// Result type alias for ENS cache operations.
pub type EnsCacheResult<T> = Result<T, EnsCacheError>;

/// Build a `ResolverError::RequestFailed` wrapped in the master error.
pub fn request_failed(
    resolver: impl Into<String>,
    status: u16,
    message: impl Into<String>,
) -> EnsCacheError {
    EnsCacheError::Resolver(ResolverError::RequestFailed {
        resolver: resolver.into(),
        status,
        message: message.into(),
    })
}

/// Build a `ResolverError::InvalidResponse` wrapped in the master error.
pub fn invalid_response(resolver: impl Into<String>, reason: impl Into<String>) -> EnsCacheError {
    EnsCacheError::Resolver(ResolverError::InvalidResponse {
        resolver: resolver.into(),
        reason: reason.into(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_deserialization() {
        let err = StorageError::Deserialization {
            key: "ens.avatar.nick.eth".to_string(),
            reason: "expected value".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ens.avatar.nick.eth"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_resolver_error_display_request_failed() {
        let err = ResolverError::RequestFailed {
            resolver: "ens-metadata".to_string(),
            status: 502,
            message: "bad gateway".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ens-metadata"));
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "map_size_mb".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("map_size_mb"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_ens_cache_error_from_variants() {
        let storage = EnsCacheError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, EnsCacheError::Storage(_)));
        assert!(!storage.is_remote());

        let resolver = request_failed("resolver", 500, "boom");
        assert!(resolver.is_remote());

        let config = EnsCacheError::from(ConfigError::MissingRequired {
            field: "resolve_url".to_string(),
        });
        assert!(matches!(config, EnsCacheError::Config(_)));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = invalid_response("resolver", "not json");
        assert_eq!(err.clone(), err);
    }
}
