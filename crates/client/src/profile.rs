//! Profile fetch/reconcile pipeline.
//!
//! Local-first, remote-reconciling, never-throw: [`ProfileService::fetch_profile`]
//! always resolves to a fully-defined [`ProfileView`], degrading from the API to
//! the cached snapshot to a placeholder as sources become unavailable.
//!
//! # Fetch order
//!
//! 1. the resolver's choice (canonical id when one is known)
//! 2. the requested identifier verbatim
//! 3. the cached canonical id when the cache matches by name, username or email
//! 4. the cached snapshot alone (no token, or every remote attempt failed)
//! 5. a placeholder built from the requested identifier

use std::sync::Arc;

use skillnet_core::{
    CachedProfile, CanonicalId, Identifier, ProfileUpdate, ProfileView, derive_username,
};
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, ProfileRecord, UserApi};
use crate::error::{ClientError, Result};
use crate::resolver::{lookup_candidates, resolve_api_identifier};
use crate::store::{IdentityStore, StoreError};

/// Whether a profile edit reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    /// The backend accepted the edit.
    Synced,
    /// Only the local snapshot was updated.
    LocalOnly(LocalOnlyReason),
}

/// Why an edit stayed local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOnlyReason {
    NoToken,
    Remote(ApiError),
}

impl Durability {
    /// Notice to show the user when the edit was not persisted remotely.
    #[must_use]
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Self::Synced => None,
            Self::LocalOnly(LocalOnlyReason::NoToken) => {
                Some("Authentication required. Profile updated locally only.")
            }
            Self::LocalOnly(LocalOnlyReason::Remote(e)) if e.is_auth() => {
                Some("Authentication required. Profile updated locally only.")
            }
            Self::LocalOnly(LocalOnlyReason::Remote(e)) if e.is_network() => {
                Some("Network error. Profile updated locally only.")
            }
            Self::LocalOnly(LocalOnlyReason::Remote(_)) => {
                Some("Failed to update profile on server. Changes saved locally only.")
            }
        }
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Result of [`ProfileService::update_profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdateOutcome {
    pub view: ProfileView,
    pub durability: Durability,
}

/// Where a fetched view came from.
#[derive(Debug)]
pub(crate) enum Source {
    Remote(ProfileRecord),
    Cache,
    Placeholder,
}

/// Fetches, normalizes and caches user profiles.
pub struct ProfileService<A> {
    api: Arc<A>,
    store: IdentityStore,
}

impl<A> Clone for ProfileService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: self.store.clone(),
        }
    }
}

impl<A> std::fmt::Debug for ProfileService<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileService").finish_non_exhaustive()
    }
}

impl<A: UserApi> ProfileService<A> {
    #[must_use]
    pub const fn new(api: Arc<A>, store: IdentityStore) -> Self {
        Self { api, store }
    }

    #[must_use]
    pub const fn api(&self) -> &Arc<A> {
        &self.api
    }

    #[must_use]
    pub const fn store(&self) -> &IdentityStore {
        &self.store
    }

    /// Identifier for the signed-in user.
    ///
    /// The stored user id wins. The snapshot's canonical id replaces it only
    /// when the snapshot is that same user; without a stored id the snapshot's
    /// id is used.
    #[must_use]
    pub fn current_identity(&self) -> Option<Identifier> {
        let stored = self
            .store
            .user_id()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read user id");
                None
            })
            .and_then(|id| Identifier::parse(&id).ok());
        let cached = self.store.cached_profile_lossy();

        match stored {
            Some(stored) if stored.is_canonical() => Some(stored),
            Some(stored) => {
                let canonical = cached
                    .filter(|c| c.matches(&stored))
                    .and_then(|c| c.canonical_id());
                Some(canonical.map_or(stored, Identifier::from))
            }
            None => cached.and_then(|c| Identifier::parse(&c.id).ok()),
        }
    }

    /// Record who just signed in.
    ///
    /// `Some(id)` is persisted as the user id and a snapshot of anyone else is
    /// dropped. `None` means the new credentials name nobody yet, so the
    /// previous identity is forgotten altogether.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn switch_user(&self, id: Option<&str>) -> std::result::Result<(), StoreError> {
        let Some(id) = id.and_then(|id| Identifier::parse(id).ok()) else {
            debug!("Signed-in user unknown; forgetting previous identity");
            return self.store.forget_user();
        };

        if self
            .store
            .cached_profile_lossy()
            .is_some_and(|c| !c.matches(&id))
        {
            info!(user_id = %id, "Different user signed in; dropping cached profile");
            self.store.forget_user()?;
        }
        self.store.set_user_id(id.as_str())
    }

    /// Resolve a profile, never failing.
    #[instrument(skip_all, fields(requested = %requested))]
    pub async fn fetch_profile(&self, requested: &Identifier) -> ProfileView {
        self.fetch_with_source(requested).await.0
    }

    /// Resolve the signed-in user's own profile and refresh the snapshot.
    ///
    /// Unlike [`Self::fetch_profile`], a remote result is cached even when no
    /// snapshot exists yet.
    #[instrument(skip_all, fields(me = %me))]
    pub async fn fetch_current_user(&self, me: &Identifier) -> ProfileView {
        self.load_current_user(me).await.0
    }

    pub(crate) async fn load_current_user(&self, me: &Identifier) -> (ProfileView, Source) {
        match self.fetch_with_source(me).await {
            (_, Source::Remote(record)) => {
                let view = self.adopt_current_user(&record);
                (view, Source::Remote(record))
            }
            other => other,
        }
    }

    /// Make `record` the signed-in user's snapshot and return its view.
    ///
    /// A snapshot belonging to someone else is replaced, not merged.
    pub fn adopt_current_user(&self, record: &ProfileRecord) -> ProfileView {
        let base = self
            .store
            .cached_profile_lossy()
            .filter(|c| same_person(c, record))
            .unwrap_or_default();
        let view = merge_view(record, Some(&base));
        self.write_back(&base, record, &view);
        view
    }

    pub(crate) async fn fetch_with_source(&self, requested: &Identifier) -> (ProfileView, Source) {
        let cached = self.store.cached_profile_lossy();

        if self.store.has_token() {
            for candidate in lookup_candidates(requested, cached.as_ref()) {
                match self.api.get_profile(&candidate).await {
                    Ok(record) => {
                        debug!(candidate = %candidate, "Profile fetched from API");
                        let view = self.reconcile(requested, &record, cached.as_ref());
                        return (view, Source::Remote(record));
                    }
                    Err(e) => {
                        warn!(candidate = %candidate, error = %e, "Profile lookup failed");
                    }
                }
            }
        } else {
            debug!("No token; skipping remote lookup");
        }

        match cached.as_ref().filter(|c| c.matches(requested)) {
            Some(cached) => {
                info!("Serving profile from cached snapshot");
                (cached.to_view(), Source::Cache)
            }
            None => {
                info!("No profile source available; using placeholder");
                (ProfileView::placeholder(requested), Source::Placeholder)
            }
        }
    }

    /// Merge a remote record, writing it back when it describes the cached user.
    fn reconcile(
        &self,
        requested: &Identifier,
        record: &ProfileRecord,
        cached: Option<&CachedProfile>,
    ) -> ProfileView {
        let same_user = cached.filter(|c| describes_cached_user(c, requested, record));
        let view = merge_view(record, same_user);
        if let Some(cached) = same_user {
            self.write_back(cached, record, &view);
        }
        view
    }

    fn write_back(&self, cached: &CachedProfile, record: &ProfileRecord, view: &ProfileView) {
        let mut updated = cached.clone();
        match record.id.as_deref() {
            Some(id) if CanonicalId::is_canonical(id) => id.clone_into(&mut updated.id),
            Some(id) if updated.id.is_empty() => id.clone_into(&mut updated.id),
            _ => {}
        }
        view.name.clone_into(&mut updated.name);
        match &record.username {
            Some(username) => username.clone_into(&mut updated.username),
            None if updated.username.is_empty() => {
                view.username.clone_into(&mut updated.username);
            }
            None => {}
        }
        if let Some(email) = &record.email {
            email.clone_into(&mut updated.email);
        }
        view.bio.clone_into(&mut updated.bio);
        view.profile_picture.clone_into(&mut updated.profile_picture_url);

        if updated != *cached
            && let Err(e) = self.store.save_cached_profile(&updated)
        {
            warn!(error = %e, "Failed to write profile snapshot");
        }

        let known = self.store.user_id().unwrap_or_default();
        let replace = match (updated.canonical_id(), known.as_deref()) {
            (Some(canonical), known) => known != Some(canonical.as_str()),
            (None, None) => !updated.id.is_empty(),
            (None, Some(_)) => false,
        };
        if replace && let Err(e) = self.store.set_user_id(&updated.id) {
            warn!(error = %e, "Failed to persist user id");
        }
    }

    /// Apply a profile edit locally first, then remotely.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Auth` when there is neither a token nor a cached
    /// snapshot to edit, and the API error when the remote write failed with no
    /// snapshot to fall back on.
    #[instrument(skip_all, fields(requested = %requested))]
    pub async fn update_profile(
        &self,
        requested: &Identifier,
        update: ProfileUpdate,
    ) -> Result<ProfileUpdateOutcome> {
        let update = update.normalized();
        let cached = self.store.cached_profile_lossy();

        let optimistic = cached.as_ref().filter(|c| c.matches(requested)).map(|c| {
            let mut edited = c.clone();
            edited.apply_update(&update);
            if let Err(e) = self.store.save_cached_profile(&edited) {
                warn!(error = %e, "Failed to write optimistic profile edit");
            }
            edited
        });

        if !self.store.has_token() {
            return optimistic.map_or_else(
                || {
                    Err(ClientError::Auth(
                        "No authentication token found. Cannot update profile.".to_string(),
                    ))
                },
                |edited| {
                    warn!("No token; profile updated locally only");
                    Ok(ProfileUpdateOutcome {
                        view: edited.to_view(),
                        durability: Durability::LocalOnly(LocalOnlyReason::NoToken),
                    })
                },
            );
        }

        // Resolve against the pre-edit snapshot: a rename must not change the target.
        let target = resolve_api_identifier(requested, cached.as_ref());

        match self.api.update_profile(&target, &update).await {
            Ok(record) => {
                let view = match &optimistic {
                    Some(edited) => {
                        let view = merge_view(&record, Some(edited));
                        self.write_back(edited, &record, &view);
                        view
                    }
                    None => merge_view(&record, None),
                };
                info!(target_id = %target, "Profile update synced");
                Ok(ProfileUpdateOutcome {
                    view,
                    durability: Durability::Synced,
                })
            }
            Err(e) => match optimistic {
                Some(edited) => {
                    warn!(error = %e, "Remote profile update failed; kept local edit");
                    Ok(ProfileUpdateOutcome {
                        view: edited.to_view(),
                        durability: Durability::LocalOnly(LocalOnlyReason::Remote(e)),
                    })
                }
                None => Err(e.into()),
            },
        }
    }

    /// All users, with follow status relative to the signed-in user.
    ///
    /// Empty without a token or on failure. A timeout is retried once without
    /// the viewer parameter.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Vec<ProfileView> {
        if !self.store.has_token() {
            debug!("No token; not listing users");
            return Vec::new();
        }

        let viewer = self.current_identity();
        let viewer = viewer.as_ref().map(Identifier::as_str);

        let records = match self.api.list_users(viewer).await {
            Ok(records) => records,
            Err(e) if e.is_timeout() => {
                warn!("User listing timed out; retrying without viewer");
                match self.api.list_users(None).await {
                    Ok(records) => records,
                    Err(e) => {
                        warn!(error = %e, "User listing retry failed");
                        return Vec::new();
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "User listing failed");
                return Vec::new();
            }
        };

        records.iter().map(|r| merge_view(r, None)).collect()
    }

    /// A profile with follow status relative to `viewer`; `None` without a
    /// token or on failure.
    #[instrument(skip(self, target), fields(target_id = %target))]
    pub async fn fetch_profile_with_status(
        &self,
        target: &Identifier,
        viewer: &str,
    ) -> Option<ProfileView> {
        if !self.store.has_token() {
            return None;
        }

        let cached = self.store.cached_profile_lossy();
        let id = resolve_api_identifier(target, cached.as_ref());
        match self.api.profile_with_status(&id, viewer).await {
            Ok(record) => Some(merge_view(&record, None)),
            Err(e) => {
                warn!(error = %e, "Profile-with-status lookup failed");
                None
            }
        }
    }
}

/// Whether `record` is about the user held in `cached`.
fn describes_cached_user(
    cached: &CachedProfile,
    requested: &Identifier,
    record: &ProfileRecord,
) -> bool {
    cached.matches(requested) || same_person(cached, record)
}

fn same_person(cached: &CachedProfile, record: &ProfileRecord) -> bool {
    let same_id = record
        .id
        .as_deref()
        .is_some_and(|id| !cached.id.is_empty() && id == cached.id);
    let same_email = record
        .email
        .as_deref()
        .is_some_and(|email| !cached.email.is_empty() && email.eq_ignore_ascii_case(&cached.email));
    same_id || same_email
}

/// Build a view from an API record, falling back to `cached` field by field.
#[must_use]
pub fn merge_view(record: &ProfileRecord, cached: Option<&CachedProfile>) -> ProfileView {
    let id = record
        .id
        .clone()
        .or_else(|| cached_field(cached, |c| c.id.as_str()))
        .unwrap_or_default();
    let name = record
        .name
        .clone()
        .or_else(|| cached_field(cached, |c| c.name.as_str()))
        .unwrap_or_default();
    let username = record
        .username
        .clone()
        .or_else(|| cached_field(cached, |c| c.username.as_str()))
        .or_else(|| record.user_id.clone())
        .unwrap_or_else(|| {
            let fallback = cached_field(cached, |c| c.id.as_str()).unwrap_or_else(|| id.clone());
            derive_username(record.email.as_deref().unwrap_or_default(), &name, &fallback)
        });

    ProfileView {
        username,
        profile_picture: record
            .profile_picture_url
            .clone()
            .or_else(|| cached_field(cached, |c| c.profile_picture_url.as_str()))
            .unwrap_or_default(),
        bio: record
            .bio
            .clone()
            .or_else(|| cached_field(cached, |c| c.bio.as_str()))
            .unwrap_or_default(),
        followers: record.follower_count.unwrap_or(0),
        following: record.following_count.unwrap_or(0),
        is_following: record.is_following.unwrap_or(false),
        id,
        name,
    }
}

fn cached_field(
    cached: Option<&CachedProfile>,
    field: impl Fn(&CachedProfile) -> &str,
) -> Option<String> {
    cached.map(field).filter(|v| !v.is_empty()).map(str::to_owned)
}
