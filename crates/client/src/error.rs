//! Crate-level error type.

use skillnet_core::IdentifierError;
use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors surfaced by the session, profile and follow components.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation needs a signed-in user.
    #[error("Authentication required: {0}")]
    Auth(String),

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The caller passed an unusable lookup key.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    /// A follow toggle for this target is already in flight.
    #[error("A follow change for {0} is already in progress")]
    ConcurrentMutation(String),

    /// The OAuth callback reported an error or was malformed.
    #[error("OAuth login failed: {0}")]
    OAuth(String),

    /// Persistent store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether this is an authentication failure, local or remote.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_)) || matches!(self, Self::Api(e) if e.is_auth())
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;
