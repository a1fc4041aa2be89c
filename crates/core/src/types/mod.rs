//! Core types for SkillNet.
//!
//! This module provides type-safe wrappers for identities, profiles, and sessions.

pub mod id;
pub mod profile;
pub mod session;

pub use id::{CanonicalId, Identifier, IdentifierError, IdentifierKind};
pub use profile::{CachedProfile, ProfileUpdate, ProfileView, derive_username};
pub use session::{OAuthProvider, SessionState};
