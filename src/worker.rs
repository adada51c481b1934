//! Cache worker lifecycle: install, activate, fetch routing, messages.
//!
//! A [`Worker`] is driven by host lifecycle events. Each operation is a
//! sequential chain of awaits over the store and the network; the host
//! guarantees install completes before activate begins and that no fetch
//! is routed before activation claims its clients. Concurrent fetch events
//! may still race an in-flight activation; there is no locking, matching
//! the source protocol.

use std::collections::HashSet;

use futures::{StreamExt, stream};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::fetch::{CacheMode, FetchedResponse, Fetcher, HttpFetcher};
use crate::manifest::{ENTRY_KEY, ResourceManifest};
use crate::store::{CacheStorage, CachedResponse};
use crate::url::{request_key, resource_key, resource_url};

/// Key under which the manifest snapshot is persisted in the manifest store.
const SNAPSHOT_KEY: &str = "manifest";

/// Callbacks into the hosting runtime.
///
/// All methods have default no-op implementations for hosts that have no
/// notion of worker versions or clients.
pub trait WorkerHost: Send + Sync {
    /// Asks the host to promote this worker version without waiting for
    /// the old version's clients to close.
    fn skip_waiting(&self) {}

    /// Takes control of already-open client pages so their future requests
    /// are intercepted without a reload.
    fn claim_clients(&self) {}
}

/// A null host that ignores all callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl WorkerHost for NoHost {}

/// Commands accepted over the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Force immediate activation of a waiting worker version.
    SkipWaiting,
    /// Fetch and cache every manifest resource not yet present.
    DownloadOffline,
}

impl WorkerCommand {
    /// Parses a wire message. Unknown messages yield `None` and are
    /// ignored by [`Worker::handle_message`].
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        match message {
            "skipWaiting" => Some(Self::SkipWaiting),
            "downloadOffline" => Some(Self::DownloadOffline),
            _ => None,
        }
    }
}

/// Outcome of routing an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The worker does not handle this request; default handling proceeds.
    PassThrough,
    /// The worker answers the request with this response.
    Response(CachedResponse),
}

/// The cache worker: reconciles a versioned resource manifest against the
/// content store and serves intercepted requests from it.
pub struct Worker<S: CacheStorage, F: Fetcher = HttpFetcher> {
    manifest: ResourceManifest,
    config: WorkerConfig,
    storage: S,
    fetcher: F,
}

impl<S: CacheStorage> Worker<S, HttpFetcher> {
    /// Creates a worker with the default HTTP fetcher.
    pub fn new(manifest: ResourceManifest, config: WorkerConfig, storage: S) -> Self {
        Self::with_fetcher(manifest, config, storage, HttpFetcher::new())
    }
}

impl<S: CacheStorage, F: Fetcher> Worker<S, F> {
    /// Creates a worker with a custom fetcher implementation.
    pub const fn with_fetcher(
        manifest: ResourceManifest,
        config: WorkerConfig,
        storage: S,
        fetcher: F,
    ) -> Self {
        Self {
            manifest,
            config,
            storage,
            fetcher,
        }
    }

    /// Returns the embedded resource manifest.
    #[must_use]
    pub const fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    /// Returns the worker configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns the storage backend.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Install step: stages every Shell Resource Set entry with
    /// cache-bypass semantics.
    ///
    /// The shell must be fully retrievable before the worker may activate,
    /// so any failed or non-success shell fetch fails the install as a
    /// whole and the host discards this worker version.
    ///
    /// # Errors
    ///
    /// Returns the first shell fetch or store failure.
    pub async fn install(&self, host: &dyn WorkerHost) -> Result<()> {
        host.skip_waiting();
        log::info!("staging {} shell resources", self.config.shell.len());

        let results: Vec<Result<(String, FetchedResponse)>> = stream::iter(&self.config.shell)
            .map(|key| {
                let url = resource_url(&self.config.origin, key);
                async move {
                    let fetched = self.fetcher.fetch(&url, CacheMode::Reload).await?;
                    if !fetched.ok() {
                        return Err(Error::Shell {
                            key: key.clone(),
                            status: fetched.status,
                        });
                    }
                    Ok((url, fetched))
                }
            })
            .buffer_unordered(self.config.concurrent_fetches.max(1))
            .collect()
            .await;

        // The shell is staged all-or-nothing: nothing is written until
        // every fetch has succeeded, and a failed write drops the staging
        // store rather than leaving it partially populated.
        let mut fetched = Vec::with_capacity(results.len());
        for result in results {
            fetched.push(result?);
        }
        for (url, response) in fetched {
            if let Err(e) = self
                .storage
                .put(&self.config.staging_store, &url, response.into_cached())
                .await
            {
                let _ = self.storage.delete_store(&self.config.staging_store).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Activate step: reconciles the content store with the current
    /// manifest and promotes staged shell entries.
    ///
    /// Any failure leaves the cache state ambiguous, so the whole state
    /// (content, staging, snapshot) is discarded and the error is logged;
    /// the next activation then takes the full-rebuild path. Errors are
    /// never re-raised to the host.
    pub async fn activate(&self, host: &dyn WorkerHost) {
        if let Err(e) = self.reconcile(host).await {
            log::error!("failed to upgrade worker cache: {e}");
            let _ = self.storage.delete_store(&self.config.content_store).await;
            let _ = self.storage.delete_store(&self.config.staging_store).await;
            let _ = self.storage.delete_store(&self.config.manifest_store).await;
        }
    }

    async fn reconcile(&self, host: &dyn WorkerHost) -> Result<()> {
        let content = self.config.content_store.as_str();

        let Some(previous) = self.load_snapshot().await? else {
            // First install or unknown prior state: rebuild the content
            // store from staging alone.
            self.storage.delete_store(content).await?;
            self.promote_staged().await?;
            self.store_snapshot().await?;
            host.claim_clients();
            return Ok(());
        };

        for url in self.storage.keys(content).await? {
            let stale = match resource_key(&self.config.origin, &url) {
                Some(key) => match self.manifest.fingerprint(&key) {
                    // Unchanged fingerprint: retain verbatim, no re-fetch.
                    Some(current) => previous.fingerprint(&key) != Some(current),
                    None => true,
                },
                None => true,
            };
            if stale {
                log::debug!("evicting stale cache entry {url}");
                self.storage.delete(content, &url).await?;
            }
        }

        // Shell files are always refreshed, overwriting retained entries.
        self.promote_staged().await?;
        self.store_snapshot().await?;
        host.claim_clients();
        Ok(())
    }

    /// Copies all staged entries into the content store, then drops the
    /// staging store.
    async fn promote_staged(&self) -> Result<()> {
        let staging = self.config.staging_store.as_str();
        for url in self.storage.keys(staging).await? {
            if let Some(entry) = self.storage.get(staging, &url).await? {
                self.storage
                    .put(&self.config.content_store, &url, entry)
                    .await?;
            }
        }
        self.storage.delete_store(staging).await
    }

    /// Reads the manifest snapshot persisted by the previous activation.
    /// A missing or unparseable snapshot selects the full-rebuild path.
    async fn load_snapshot(&self) -> Result<Option<ResourceManifest>> {
        let entry = self
            .storage
            .get(&self.config.manifest_store, SNAPSHOT_KEY)
            .await?;
        Ok(entry.and_then(|e| serde_json::from_slice(&e.body).ok()))
    }

    async fn store_snapshot(&self) -> Result<()> {
        let entry = CachedResponse {
            url: SNAPSHOT_KEY.to_string(),
            status: 200,
            headers: Vec::new(),
            body: self.manifest.to_json()?,
        };
        self.storage
            .put(&self.config.manifest_store, SNAPSHOT_KEY, entry)
            .await
    }

    /// Routes an intercepted request.
    ///
    /// Non-GET requests, cross-origin URLs, and keys outside the manifest
    /// pass through. The entry document is served online-first, everything
    /// else cache-first.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures that have no cached fallback.
    pub async fn handle_request(&self, method: &str, url: &str) -> Result<RouteOutcome> {
        if method != "GET" {
            return Ok(RouteOutcome::PassThrough);
        }
        let Some(key) = request_key(&self.config.origin, url) else {
            return Ok(RouteOutcome::PassThrough);
        };
        if !self.manifest.contains(&key) {
            return Ok(RouteOutcome::PassThrough);
        }

        let response = if key == ENTRY_KEY {
            self.online_first(url).await?
        } else {
            self.cache_first(url).await?
        };
        Ok(RouteOutcome::Response(response))
    }

    /// Serves from the content store, falling back to the network and
    /// lazily populating the cache on a successful fetch.
    async fn cache_first(&self, url: &str) -> Result<CachedResponse> {
        let content = self.config.content_store.as_str();
        if let Some(hit) = self.storage.get(content, url).await? {
            return Ok(hit);
        }

        let response = self.fetcher.fetch(url, CacheMode::Default).await?.into_cached();
        if response.ok() {
            self.storage.put(content, url, response.clone()).await?;
        }
        Ok(response)
    }

    /// Prefers the network so the entry document is as fresh as possible,
    /// falling back to the cached copy only when the fetch fails outright.
    async fn online_first(&self, url: &str) -> Result<CachedResponse> {
        let content = self.config.content_store.as_str();
        match self.fetcher.fetch(url, CacheMode::Default).await {
            Ok(fetched) => {
                let response = fetched.into_cached();
                self.storage.put(content, url, response.clone()).await?;
                Ok(response)
            }
            Err(e) => match self.storage.get(content, url).await? {
                Some(hit) => Ok(hit),
                None => Err(e),
            },
        }
    }

    /// Fetches and caches every manifest resource not yet in the content
    /// store, making the application fully available offline.
    ///
    /// The batch succeeds or fails as a unit: everything is fetched before
    /// anything is written, so a single failure leaves the cache untouched.
    ///
    /// # Errors
    ///
    /// Returns the first fetch failure or non-success status.
    pub async fn prefetch_missing(&self) -> Result<usize> {
        let content = self.config.content_store.as_str();
        let origin = self.config.origin.as_str();

        let mut cached = HashSet::new();
        for url in self.storage.keys(content).await? {
            if let Some(key) = resource_key(origin, &url) {
                cached.insert(key);
            }
        }
        let missing: Vec<&str> = self
            .manifest
            .keys()
            .filter(|key| !cached.contains(*key))
            .collect();
        log::info!("prefetching {} of {} resources", missing.len(), self.manifest.len());

        let results: Vec<Result<(String, FetchedResponse)>> = stream::iter(missing)
            .map(|key| {
                let url = resource_url(origin, key);
                async move {
                    let fetched = self.fetcher.fetch(&url, CacheMode::Default).await?;
                    if !fetched.ok() {
                        return Err(Error::Status {
                            url,
                            status: fetched.status,
                        });
                    }
                    Ok((url, fetched))
                }
            })
            .buffer_unordered(self.config.concurrent_fetches.max(1))
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        for result in results {
            fetched.push(result?);
        }

        let count = fetched.len();
        for (url, response) in fetched {
            self.storage.put(content, &url, response.into_cached()).await?;
        }
        Ok(count)
    }

    /// Dispatches a message-channel command. Unknown messages are ignored.
    ///
    /// # Errors
    ///
    /// Propagates prefetch failures from `downloadOffline`.
    pub async fn handle_message(&self, message: &str, host: &dyn WorkerHost) -> Result<()> {
        match WorkerCommand::parse(message) {
            Some(WorkerCommand::SkipWaiting) => {
                host.skip_waiting();
                Ok(())
            }
            Some(WorkerCommand::DownloadOffline) => self.prefetch_missing().await.map(|_| ()),
            None => {
                log::debug!("ignoring unknown worker message: {message}");
                Ok(())
            }
        }
    }
}
