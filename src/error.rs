//! Error types for the shellcache library.

use thiserror::Error;

/// Errors that can occur during cache lifecycle and routing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error from the network layer.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error from the cache store backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource manifest could not be parsed.
    #[error("invalid resource manifest: {0}")]
    Manifest(String),

    /// A cached entry could not be encoded or decoded.
    #[error("cache store codec error: {0}")]
    Store(String),

    /// A shell resource could not be retrieved during install.
    #[error("shell resource {key:?} fetch returned status {status}")]
    Shell {
        /// Manifest key of the shell resource.
        key: String,
        /// HTTP status returned by the server.
        status: u16,
    },

    /// A fetch returned a non-success status where one was required.
    #[error("fetch of {url} returned status {status}")]
    Status {
        /// Full URL that was fetched.
        url: String,
        /// HTTP status returned by the server.
        status: u16,
    },
}

/// A specialized `Result` type for shellcache operations.
pub type Result<T> = std::result::Result<T, Error>;
