//! Network fetch abstraction for testability.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::error::Result;
use crate::store::CachedResponse;

/// How the HTTP cache between the worker and the network is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Normal request, intermediate caches may answer.
    Default,
    /// Force a network round-trip, not a conditional GET. Used when
    /// staging shell resources so a stale intermediary copy can never be
    /// promoted into the content store.
    Reload,
}

/// A response as it came off the network.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Full URL the response was fetched from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl FetchedResponse {
    /// Returns `true` if the status denotes success (2xx).
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts the response into its storable form.
    #[must_use]
    pub fn into_cached(self) -> CachedResponse {
        CachedResponse {
            url: self.url,
            status: self.status,
            headers: self.headers,
            body: self.body.to_vec(),
        }
    }
}

/// Abstraction over the network fetch capability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` with the given cache mode.
    ///
    /// A non-success HTTP status is not an error here; callers decide what
    /// statuses they accept. Errors mean the request never completed.
    async fn fetch(&self, url: &str, mode: CacheMode) -> Result<FetchedResponse>;
}

/// Default fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a fresh client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher reusing an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, mode: CacheMode) -> Result<FetchedResponse> {
        let mut request = self.client.get(url);
        if mode == CacheMode::Reload {
            request = request
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let final_url = response.url().to_string();
        let body = response.bytes().await?;

        Ok(FetchedResponse {
            url: final_url,
            status,
            headers,
            body,
        })
    }
}
