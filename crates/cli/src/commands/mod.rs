//! Subcommand implementations.

pub mod follow;
pub mod profile;
pub mod session;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use skillnet_client::{
    ApiError, ClientConfig, ClientError, ConfigError, FileStore, HttpUserApi, IdentityStore,
    ProfileService, SessionManager, StoreError,
};
use skillnet_core::{Identifier, IdentifierError};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Could not create API client: {0}")]
    Api(#[from] ApiError),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    /// No user given and no signed-in user to default to.
    #[error("Not signed in; pass an identifier or run `skillnet login` first")]
    NotSignedIn,

    #[error("Missing password; pass --password or set SKILLNET_PASSWORD")]
    MissingPassword,

    #[error("Unknown OAuth provider: {0}. Valid providers: google, github")]
    UnknownProvider(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),
}

/// Shared wiring for every command.
pub struct Context {
    pub config: ClientConfig,
    pub profiles: ProfileService<HttpUserApi>,
}

impl Context {
    /// Load configuration and open the identity file at `store_path`.
    pub fn open(store_path: &Path) -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;
        let store = IdentityStore::new(Arc::new(FileStore::open(store_path)?));
        let api = HttpUserApi::new(&config, store.clone())?;
        tracing::debug!(
            store = %store_path.display(),
            api = %api.base_url(),
            "Client ready"
        );

        Ok(Self {
            config,
            profiles: ProfileService::new(Arc::new(api), store),
        })
    }

    pub fn session(&self) -> SessionManager<HttpUserApi> {
        SessionManager::new(self.profiles.clone(), &self.config)
    }

    /// `raw` when given, otherwise the signed-in user.
    pub fn identifier_or_me(&self, raw: Option<&str>) -> Result<Identifier, CliError> {
        match raw {
            Some(raw) => Ok(Identifier::parse(raw)?),
            None => self.profiles.current_identity().ok_or(CliError::NotSignedIn),
        }
    }
}

/// Print `value` as pretty JSON on stdout.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
