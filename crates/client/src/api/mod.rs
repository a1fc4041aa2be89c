//! SkillNet REST API boundary.
//!
//! This module provides:
//! - [`UserApi`], the seam every higher layer talks to
//! - [`HttpUserApi`], its `reqwest` implementation
//! - [`ProfileRecord`], the single normalized shape for profile payloads
//! - [`ApiError`], the tagged failure taxonomy
//!
//! # Endpoints
//!
//! All paths are relative to the configured API base URL:
//!
//! - `GET users/{id}/profile` (then `GET users/{id}` on 404)
//! - `PUT users/{id}/profile`
//! - `GET users?currentUserId={id}`
//! - `GET users/{id}/profile-with-status?currentUserId={id}`
//! - `POST users/{follower}/follow?targetUserId={id}` and `/unfollow`
//! - `POST auth/login`
//! - `GET oauth2/user`

mod error;
mod http;
mod types;

pub use error::ApiError;
pub use http::HttpUserApi;
pub use types::{LoginResponse, ProfileRecord};

use std::future::Future;

use secrecy::SecretString;
use skillnet_core::ProfileUpdate;

/// Operations the client needs from the backend.
///
/// Implementations attach credentials themselves; callers pass only ids.
pub trait UserApi: Send + Sync {
    /// Fetch a profile by canonical id or any alias the backend accepts.
    fn get_profile(&self, id: &str)
    -> impl Future<Output = Result<ProfileRecord, ApiError>> + Send;

    /// Apply a partial profile edit and return the updated profile.
    fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<ProfileRecord, ApiError>> + Send;

    /// List users, optionally with follow status relative to `viewer`.
    fn list_users(
        &self,
        viewer: Option<&str>,
    ) -> impl Future<Output = Result<Vec<ProfileRecord>, ApiError>> + Send;

    /// Fetch a profile with follow status relative to `viewer`.
    fn profile_with_status(
        &self,
        id: &str,
        viewer: &str,
    ) -> impl Future<Output = Result<ProfileRecord, ApiError>> + Send;

    /// Make `follower` follow `target`.
    fn follow(
        &self,
        follower: &str,
        target: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Make `follower` stop following `target`.
    fn unfollow(
        &self,
        follower: &str,
        target: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Exchange credentials for a token.
    fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;

    /// The user the current token belongs to, `None` if the backend
    /// answered with an empty body.
    fn current_user(&self) -> impl Future<Output = Result<Option<ProfileRecord>, ApiError>> + Send;
}
