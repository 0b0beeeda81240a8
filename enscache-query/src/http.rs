//! HTTP resolver backed by an ENS resolution API and the ENS metadata service.

use async_trait::async_trait;
use enscache_core::{
    invalid_response, request_failed, EnsCacheConfig, EnsCacheError, EnsCacheResult, EnsImage,
    EnsResolver, ImageKind, PrimaryAddress, ResolverError,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const RESOLVER_ID: &str = "http";

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    address: Option<String>,
}

/// [`EnsResolver`] speaking HTTP.
///
/// - `GET {resolve_url}/{name}` answers `{ "address": ... }`.
/// - `GET {metadata_url}/{kind}/{name}` succeeds when the name has that image,
///   in which case the request URL itself is the image URL.
pub struct HttpEnsResolver {
    client: Client,
    resolve_url: String,
    metadata_url: String,
    timeout: Duration,
}

impl HttpEnsResolver {
    pub fn new(config: &EnsCacheConfig) -> EnsCacheResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| request_failed(RESOLVER_ID, 0, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            resolve_url: config.resolve_url.trim_end_matches('/').to_string(),
            metadata_url: config.metadata_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        })
    }

    fn address_url(&self, name: &str) -> String {
        format!("{}/{}", self.resolve_url, name)
    }

    fn image_url(&self, kind: ImageKind, name: &str) -> String {
        format!("{}/{}/{}", self.metadata_url, kind.as_str(), name)
    }

    fn send_error(&self, e: reqwest::Error) -> EnsCacheError {
        if e.is_timeout() {
            ResolverError::Timeout {
                resolver: RESOLVER_ID.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
            .into()
        } else {
            request_failed(RESOLVER_ID, 0, format!("HTTP request failed: {}", e))
        }
    }
}

async fn failure(response: reqwest::Response) -> EnsCacheError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    request_failed(RESOLVER_ID, status.as_u16(), body)
}

#[async_trait]
impl EnsResolver for HttpEnsResolver {
    async fn fetch_primary(&self, name: &str) -> EnsCacheResult<PrimaryAddress> {
        let url = self.address_url(name);
        tracing::debug!(url = %url, "Resolving ENS address");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        match response.status() {
            status if status.is_success() => {
                let body: ResolveResponse = response.json().await.map_err(|e| {
                    invalid_response(RESOLVER_ID, format!("Failed to parse response: {}", e))
                })?;
                Ok(PrimaryAddress {
                    address: body.address,
                })
            }
            StatusCode::NOT_FOUND => Ok(PrimaryAddress::default()),
            _ => Err(failure(response).await),
        }
    }

    async fn fetch_image(&self, kind: ImageKind, name: &str) -> EnsCacheResult<EnsImage> {
        let url = self.image_url(kind, name);
        tracing::debug!(url = %url, "Checking ENS image");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        match response.status() {
            status if status.is_success() => Ok(EnsImage::new(url)),
            StatusCode::NOT_FOUND => Ok(EnsImage::default()),
            _ => Err(failure(response).await),
        }
    }

    fn resolver_id(&self) -> &str {
        RESOLVER_ID
    }
}

impl std::fmt::Debug for HttpEnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEnsResolver")
            .field("resolve_url", &self.resolve_url)
            .field("metadata_url", &self.metadata_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
