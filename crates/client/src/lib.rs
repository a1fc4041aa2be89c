//! SkillNet Client - Identity resolution and profile synchronization.
//!
//! This crate keeps a local identity (token, user id, profile snapshot) in step
//! with the SkillNet backend:
//! - [`store`] - Persistent key-value identity store (memory or JSON file)
//! - [`api`] - `UserApi` seam and its `reqwest` implementation
//! - [`resolver`] - Picks the API identifier for a loosely-typed candidate
//! - [`profile`] - Local-first, never-failing profile fetch and optimistic edits
//! - [`session`] - Login, OAuth callback, revalidation and logout
//! - [`follow`] - Optimistic follow toggles with rollback and reconciliation
//!
//! # Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use skillnet_client::{
//!     ClientConfig, FileStore, FollowSynchronizer, HttpUserApi, IdentityStore, ProfileService,
//!     SessionManager,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let store = IdentityStore::new(Arc::new(FileStore::open(".skillnet/identity.json")?));
//! let api = Arc::new(HttpUserApi::new(&config, store.clone())?);
//! let profiles = ProfileService::new(api, store);
//!
//! let session = SessionManager::new(profiles.clone(), &config);
//! let follows = FollowSynchronizer::new(profiles, &config);
//! session.initialize().await;
//! # drop(follows);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod follow;
pub mod profile;
pub mod resolver;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::{ApiError, HttpUserApi, LoginResponse, ProfileRecord, UserApi};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use follow::{FollowState, FollowSynchronizer};
pub use profile::{Durability, LocalOnlyReason, ProfileService, ProfileUpdateOutcome, merge_view};
pub use resolver::resolve_api_identifier;
pub use session::{LoginOutcome, SessionManager};
pub use store::{FileStore, IdentityStore, KvStore, MemoryStore, StoreError};
