//! Resource manifest: the deploy-time map of resource keys to content
//! fingerprints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The distinguished manifest key for the application entry document.
pub const ENTRY_KEY: &str = "/";

/// Mapping from logical resource key to content fingerprint.
///
/// Built at deploy time and immutable at runtime. Fingerprints are opaque
/// change-detection tokens (32-character lowercase hex), not a security
/// primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest {
    entries: BTreeMap<String, String>,
}

impl ResourceManifest {
    /// Builds a manifest from `(key, fingerprint)` pairs without fingerprint
    /// validation. Intended for programmatic construction.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parses a manifest from its JSON wire form, validating that every
    /// fingerprint is 32 lowercase hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] if the JSON is malformed or any
    /// fingerprint fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| Error::Manifest(e.to_string()))?;
        for (key, fingerprint) in &manifest.entries {
            if !is_valid_fingerprint(fingerprint) {
                return Err(Error::Manifest(format!(
                    "key {key:?} has malformed fingerprint {fingerprint:?}"
                )));
            }
        }
        Ok(manifest)
    }

    /// Serializes the manifest to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Store(e.to_string()))
    }

    /// Returns the fingerprint for a resource key, if present.
    #[must_use]
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns `true` if the manifest contains the given key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over all resource keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of resources in the manifest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns `true` if `s` is a well-formed content fingerprint.
fn is_valid_fingerprint(s: &str) -> bool {
    s.len() == 32
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
