//! shellcache - An offline-first asset cache worker.
//!
//! This library implements the cache reconciliation and serving protocol of
//! a generated application service worker: a deploy-time resource manifest
//! (path → content fingerprint) drives an install / activate / fetch /
//! message lifecycle over a named key-value store and a fetch capability.
//!
//! # Example
//!
//! ```no_run
//! use shellcache::{MemoryStorage, NoHost, ResourceManifest, Worker, WorkerConfig};
//!
//! # async fn example() -> shellcache::Result<()> {
//! let manifest = ResourceManifest::from_json(
//!     r#"{"/": "0123456789abcdef0123456789abcdef"}"#,
//! )?;
//! let config = WorkerConfig::new("https://app.example.com").with_shell(["/"]);
//! let worker = Worker::new(manifest, config, MemoryStorage::new());
//!
//! // Lifecycle: stage the shell, then reconcile the content store.
//! worker.install(&NoHost).await?;
//! worker.activate(&NoHost).await;
//!
//! // Route an intercepted request.
//! let outcome = worker
//!     .handle_request("GET", "https://app.example.com/")
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod store;
pub mod url;
pub mod worker;

// Re-export main types for convenience
pub use config::WorkerConfig;
pub use error::{Error, Result};
pub use fetch::{CacheMode, FetchedResponse, Fetcher, HttpFetcher};
pub use manifest::{ENTRY_KEY, ResourceManifest};
pub use store::{CacheStorage, CachedResponse, DiskStorage, MemoryStorage};
pub use worker::{NoHost, RouteOutcome, Worker, WorkerCommand, WorkerHost};
