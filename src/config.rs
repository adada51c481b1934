//! Worker configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a cache worker instance.
///
/// The resource manifest itself is injected separately; this carries the
/// deployment-shaped knobs around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin the worker serves, e.g. `https://app.example.com`.
    pub origin: String,
    /// Shell Resource Set: manifest keys that must be retrievable before
    /// the worker may activate, in fetch order.
    #[serde(default)]
    pub shell: Vec<String>,
    /// Name of the durable store serving end-user requests.
    #[serde(default = "default_content_store")]
    pub content_store: String,
    /// Name of the transient store holding freshly fetched shell entries
    /// between install and activate.
    #[serde(default = "default_staging_store")]
    pub staging_store: String,
    /// Name of the store holding the persisted manifest snapshot.
    #[serde(default = "default_manifest_store")]
    pub manifest_store: String,
    /// Fan-out limit for shell install and bulk prefetch fetches.
    #[serde(default = "default_concurrent_fetches")]
    pub concurrent_fetches: usize,
}

fn default_content_store() -> String {
    "app-content".to_string()
}

fn default_staging_store() -> String {
    "app-staging".to_string()
}

fn default_manifest_store() -> String {
    "app-manifest".to_string()
}

const fn default_concurrent_fetches() -> usize {
    4
}

impl WorkerConfig {
    /// Creates a configuration for the given origin with default store
    /// names and an empty shell set.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            shell: Vec::new(),
            content_store: default_content_store(),
            staging_store: default_staging_store(),
            manifest_store: default_manifest_store(),
            concurrent_fetches: default_concurrent_fetches(),
        }
    }

    /// Sets the Shell Resource Set.
    #[must_use]
    pub fn with_shell<I, S>(mut self, shell: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell = shell.into_iter().map(Into::into).collect();
        self
    }

    /// Prefixes all three store names, so multiple apps can share one
    /// storage backend.
    #[must_use]
    pub fn with_store_prefix(mut self, prefix: &str) -> Self {
        self.content_store = format!("{prefix}-content");
        self.staging_store = format!("{prefix}-staging");
        self.manifest_store = format!("{prefix}-manifest");
        self
    }

    /// Sets the fetch fan-out limit.
    #[must_use]
    pub const fn with_concurrent_fetches(mut self, concurrent: usize) -> Self {
        self.concurrent_fetches = concurrent;
        self
    }
}
