//! Error types for tier-client.

use thiserror::Error;

use crate::sidecar::SidecarError;

/// Top-level error type returned by [`crate::get_client`].
///
/// Every variant is transparent: the underlying error surfaces once,
/// undecorated, to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a base URL nor an API key could be found, and no sidecar was requested.
    #[error("need to set TIER_API_KEY or TIER_BASE_URL (or enable the local sidecar)")]
    MissingEndpoint,

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by [`crate::client::TierClient`] while talking to the API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tier API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
