//! Unified error handling for the client core.
//!
//! Errors from the network layer are never swallowed: everything reaches the
//! calling feature code, which decides user-facing messaging. The only
//! internal recovery is the single retry-after-refresh path in the
//! transport.

use thiserror::Error;

/// Errors that can occur when talking to the Threadline backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transient network failure (timeout, DNS, connection reset).
    /// Surfaced as-is; the core performs no retry.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-401 error status from the backend.
    #[error("HTTP {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    /// A 401 that survived the single refresh-and-retry.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Token refresh failed or no refresh token was stored. Stored
    /// credentials have been purged; the shopper must sign in again.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The backend answered with a non-success `messageType` envelope.
    #[error("API error: {0}")]
    Api(String),

    /// An access token that could not be decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// JSON (de)serialization failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Credential or guest-cart persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid cart edit (e.g. zero-quantity add).
    #[error("cart error: {0}")]
    Cart(#[from] threadline_core::CartError),
}

/// Errors from the on-device stores (credentials, guest cart).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted payload could not be decoded.
    #[error("corrupt store: {0}")]
    Corrupt(#[from] serde_json::Error),
}
