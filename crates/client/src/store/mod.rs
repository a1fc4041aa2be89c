//! Persistent identity store.
//!
//! A small key-value layer holding the auth token, the canonical user id and a
//! JSON snapshot of the signed-in user's profile. Backends implement
//! [`KvStore`]; everything above talks to the typed [`IdentityStore`] wrapper.
//!
//! Writers always replace a whole value; readers see the last committed value.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use secrecy::SecretString;
use skillnet_core::{CachedProfile, CanonicalId};
use thiserror::Error;
use tracing::{debug, warn};

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the current user's id.
pub const USER_ID_KEY: &str = "userId";
/// Key holding the JSON [`CachedProfile`].
pub const CACHED_PROFILE_KEY: &str = "skillnet_user";

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// String key-value storage.
pub trait KvStore: Send + Sync {
    /// Get the value for a key. Returns `None` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a key, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed accessors over a shared [`KvStore`].
#[derive(Clone)]
pub struct IdentityStore {
    backend: Arc<dyn KvStore>,
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore").finish_non_exhaustive()
    }
}

impl IdentityStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The stored bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    pub fn token(&self) -> Result<Option<SecretString>, StoreError> {
        Ok(self
            .backend
            .get(TOKEN_KEY)?
            .filter(|t| !t.is_empty())
            .map(SecretString::from))
    }

    /// Whether a token is held. Read failures count as "no token".
    #[must_use]
    pub fn has_token(&self) -> bool {
        match self.token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to read token from store");
                false
            }
        }
    }

    /// Persist the bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    pub fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.backend.set(TOKEN_KEY, token)
    }

    /// The stored user id, whatever its form.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    pub fn user_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.backend.get(USER_ID_KEY)?.filter(|id| !id.is_empty()))
    }

    /// The stored user id when it is canonical.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    pub fn canonical_user_id(&self) -> Result<Option<CanonicalId>, StoreError> {
        Ok(self
            .user_id()?
            .and_then(|id| CanonicalId::parse(&id).ok()))
    }

    /// Persist the current user's id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    pub fn set_user_id(&self, id: &str) -> Result<(), StoreError> {
        self.backend.set(USER_ID_KEY, id)
    }

    /// The cached profile snapshot.
    ///
    /// A blob that no longer parses is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    pub fn cached_profile(&self) -> Result<Option<CachedProfile>, StoreError> {
        let Some(raw) = self.backend.get(CACHED_PROFILE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached profile");
                Ok(None)
            }
        }
    }

    /// Cached profile, logging and swallowing read failures.
    #[must_use]
    pub fn cached_profile_lossy(&self) -> Option<CachedProfile> {
        self.cached_profile().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read cached profile");
            None
        })
    }

    /// Replace the cached profile snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the profile cannot be serialized or written.
    pub fn save_cached_profile(&self, profile: &CachedProfile) -> Result<(), StoreError> {
        let raw = serde_json::to_string(profile)?;
        self.backend.set(CACHED_PROFILE_KEY, &raw)?;
        debug!(user_id = %profile.id, "Cached profile saved");
        Ok(())
    }

    /// Remove the user id and cached profile, keeping the token.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError` encountered; both keys are still attempted.
    pub fn forget_user(&self) -> Result<(), StoreError> {
        let results = [
            self.backend.delete(USER_ID_KEY),
            self.backend.delete(CACHED_PROFILE_KEY),
        ];
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        Ok(())
    }

    /// Remove token, user id and cached profile.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError` encountered; remaining keys are still attempted.
    pub fn clear(&self) -> Result<(), StoreError> {
        let results = [
            self.backend.delete(TOKEN_KEY),
            self.backend.delete(USER_ID_KEY),
            self.backend.delete(CACHED_PROFILE_KEY),
        ];
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        Ok(())
    }
}
