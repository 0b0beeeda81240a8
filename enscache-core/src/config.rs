//! Configuration types

use crate::{ConfigError, DEFAULT_STALE_TIME, ENS_PROFILE_VERSION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORE_PATH: &str = ".enscache";
const DEFAULT_MAP_SIZE_MB: usize = 64;
const DEFAULT_RESOLVE_URL: &str = "https://api.ensideas.com/ens/resolve";
const DEFAULT_METADATA_URL: &str = "https://metadata.ens.domains/mainnet";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Settings for the local store, the query cache and the HTTP resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsCacheConfig {
    /// Directory holding the LMDB environment.
    pub store_path: PathBuf,
    /// LMDB map size in megabytes.
    pub map_size_mb: usize,
    /// Version tag written with and required of every ENS entry.
    pub profile_version: String,
    /// Staleness window of the in-memory query cache.
    pub stale_time: Duration,
    /// Endpoint answering `GET {resolve_url}/{name}` with `{ "address": ... }`.
    pub resolve_url: String,
    /// Base of the ENS metadata service serving `{kind}/{name}` images.
    pub metadata_url: String,
    /// Per-request timeout for the resolver.
    pub request_timeout: Duration,
}

impl Default for EnsCacheConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            profile_version: ENS_PROFILE_VERSION.to_string(),
            stale_time: DEFAULT_STALE_TIME,
            resolve_url: DEFAULT_RESOLVE_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl EnsCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an EnsCacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ENSCACHE_STORE_PATH`: LMDB directory (default: `.enscache`)
    /// - `ENSCACHE_MAP_SIZE_MB`: LMDB map size (default: 64)
    /// - `ENSCACHE_STALE_TIME_MS`: query staleness window (default: 10000)
    /// - `ENSCACHE_RESOLVE_URL`: address resolution endpoint
    /// - `ENSCACHE_METADATA_URL`: ENS metadata service base
    /// - `ENSCACHE_TIMEOUT_MS`: resolver request timeout (default: 10000)
    ///
    /// Unparsable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let store_path = std::env::var("ENSCACHE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let map_size_mb = std::env::var("ENSCACHE_MAP_SIZE_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.map_size_mb);

        let stale_time = std::env::var("ENSCACHE_STALE_TIME_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.stale_time);

        let resolve_url = std::env::var("ENSCACHE_RESOLVE_URL").unwrap_or(defaults.resolve_url);
        let metadata_url = std::env::var("ENSCACHE_METADATA_URL").unwrap_or(defaults.metadata_url);

        let request_timeout = std::env::var("ENSCACHE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);

        Self {
            store_path,
            map_size_mb,
            profile_version: defaults.profile_version,
            stale_time,
            resolve_url,
            metadata_url,
            request_timeout,
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_map_size_mb(mut self, size: usize) -> Self {
        self.map_size_mb = size;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_resolve_url(mut self, url: impl Into<String>) -> Self {
        self.resolve_url = url.into();
        self
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: self.map_size_mb.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.profile_version.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "profile_version".to_string(),
            });
        }
        for (field, url) in [
            ("resolve_url", &self.resolve_url),
            ("metadata_url", &self.metadata_url),
        ] {
            if url.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                });
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: url.clone(),
                    reason: "must be an http(s) url".to_string(),
                });
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EnsCacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.profile_version, "0.2.0");
        assert_eq!(config.stale_time, Duration::from_secs(10));
    }

    #[test]
    fn test_config_builder() {
        let config = EnsCacheConfig::new()
            .with_store_path("/tmp/ens")
            .with_map_size_mb(8)
            .with_stale_time(Duration::from_millis(250))
            .with_resolve_url("http://localhost:8080/resolve")
            .with_metadata_url("http://localhost:8080/meta")
            .with_request_timeout(Duration::from_secs(2));

        assert_eq!(config.store_path, PathBuf::from("/tmp/ens"));
        assert_eq!(config.map_size_mb, 8);
        assert_eq!(config.stale_time, Duration::from_millis(250));
        assert_eq!(config.resolve_url, "http://localhost:8080/resolve");
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_map_size() {
        let err = EnsCacheConfig::new().with_map_size_mb(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "map_size_mb"));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let err = EnsCacheConfig::new()
            .with_resolve_url("ftp://resolver")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "resolve_url"));
    }

    #[test]
    fn test_validate_rejects_empty_metadata_url() {
        let err = EnsCacheConfig::new().with_metadata_url("").validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref field } if field == "metadata_url"));
    }
}
