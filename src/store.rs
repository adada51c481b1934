//! Named key-value cache store abstraction and backends.
//!
//! Stores are opened by name on first use and hold [`CachedResponse`]
//! entries keyed by full request URL. Access is all-or-nothing per key:
//! a `put` either lands completely or not at all.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A cached HTTP response: body plus enough metadata to replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Full URL of the original request.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    #[serde(with = "body_encoding")]
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Returns `true` if the status denotes success (2xx).
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Base64 body encoding so entries serialize as plain JSON on disk.
mod body_encoding {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Abstraction over a persistent named key-value store, after the host
/// cache-storage capability: open-by-name, get/put/delete by key,
/// enumerate keys, delete a whole store.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Looks up an entry by key.
    async fn get(&self, store: &str, key: &str) -> Result<Option<CachedResponse>>;

    /// Inserts or replaces an entry.
    async fn put(&self, store: &str, key: &str, response: CachedResponse) -> Result<()>;

    /// Removes an entry. Returns `true` if it existed.
    async fn delete(&self, store: &str, key: &str) -> Result<bool>;

    /// Lists all keys currently present in a store.
    async fn keys(&self, store: &str) -> Result<Vec<String>>;

    /// Deletes a store and all its entries. Deleting a store that does not
    /// exist is not an error.
    async fn delete_store(&self, store: &str) -> Result<()>;
}

/// In-memory store backend, used in tests and short-lived embeddings.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: Mutex<HashMap<String, BTreeMap<String, CachedResponse>>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn get(&self, store: &str, key: &str) -> Result<Option<CachedResponse>> {
        let stores = self.stores.lock().expect("storage lock poisoned");
        Ok(stores.get(store).and_then(|s| s.get(key)).cloned())
    }

    async fn put(&self, store: &str, key: &str, response: CachedResponse) -> Result<()> {
        let mut stores = self.stores.lock().expect("storage lock poisoned");
        stores
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<bool> {
        let mut stores = self.stores.lock().expect("storage lock poisoned");
        Ok(stores
            .get_mut(store)
            .is_some_and(|s| s.remove(key).is_some()))
    }

    async fn keys(&self, store: &str) -> Result<Vec<String>> {
        let stores = self.stores.lock().expect("storage lock poisoned");
        Ok(stores
            .get(store)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_store(&self, store: &str) -> Result<()> {
        let mut stores = self.stores.lock().expect("storage lock poisoned");
        stores.remove(store);
        Ok(())
    }
}

/// Durable store backend over a directory tree: one subdirectory per store,
/// one JSON file per entry, with the key base64-encoded into the filename.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates a backend rooted at `root`. The directory is created lazily
    /// on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, store: &str, key: &str) -> PathBuf {
        self.root
            .join(store)
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(key)))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn get(&self, store: &str, key: &str) -> Result<Option<CachedResponse>> {
        let path = self.entry_path(store, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let response =
                    serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
                Ok(Some(response))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, store: &str, key: &str, response: CachedResponse) -> Result<()> {
        let dir = self.root.join(store);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.entry_path(store, key);
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(&response).map_err(|e| Error::Store(e.to_string()))?;

        // Write tmp + rename so a torn write never becomes visible.
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<bool> {
        let path = self.entry_path(store, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, store: &str) -> Result<Vec<String>> {
        let dir = self.root.join(store);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let Some(encoded) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(bytes) = URL_SAFE_NO_PAD.decode(encoded)
                && let Ok(key) = String::from_utf8(bytes)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete_store(&self, store: &str) -> Result<()> {
        let dir = self.root.join(store);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
