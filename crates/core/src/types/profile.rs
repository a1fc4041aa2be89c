//! Profile models.
//!
//! - [`CachedProfile`] is the denormalized snapshot of the signed-in user that
//!   survives restarts.
//! - [`ProfileView`] is the fully-defined shape handed to callers.
//! - [`ProfileUpdate`] is a partial edit, serialized as the backend's update body.

use serde::{Deserialize, Serialize};

use super::id::{CanonicalId, Identifier, IdentifierKind};

/// Snapshot of the current user's profile kept in the persistent store.
///
/// Serialized with the same field names the web client used, so an existing
/// blob can be read back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachedProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub profile_picture_url: String,
}

impl CachedProfile {
    /// The cached id, when it is in canonical form.
    #[must_use]
    pub fn canonical_id(&self) -> Option<CanonicalId> {
        CanonicalId::parse(&self.id).ok()
    }

    /// Whether `candidate` refers to this cached user.
    ///
    /// Matches on exact id, or case-insensitively on name, username or email.
    #[must_use]
    pub fn matches(&self, candidate: &Identifier) -> bool {
        (!self.id.is_empty() && self.id == candidate.as_str())
            || candidate.eq_ignore_case(&self.name)
            || candidate.eq_ignore_case(&self.username)
            || candidate.eq_ignore_case(&self.email)
    }

    /// Whether `candidate` matches one of the human-readable aliases only.
    #[must_use]
    pub fn matches_alias(&self, candidate: &Identifier) -> bool {
        candidate.eq_ignore_case(&self.name)
            || candidate.eq_ignore_case(&self.username)
            || candidate.eq_ignore_case(&self.email)
    }

    /// Apply a partial edit; empty or missing fields keep their cached value.
    pub fn apply_update(&mut self, update: &ProfileUpdate) {
        if let Some(name) = non_empty(update.full_name.as_deref()) {
            self.name = name.to_owned();
        }
        if let Some(bio) = non_empty(update.bio.as_deref()) {
            self.bio = bio.to_owned();
        }
        if let Some(url) = non_empty(update.profile_picture_url.as_deref()) {
            self.profile_picture_url = url.to_owned();
        }
    }

    /// View built from the cache alone (degraded mode).
    ///
    /// Counters are unknown offline and reported as zero.
    #[must_use]
    pub fn to_view(&self) -> ProfileView {
        let name = if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        };
        let username = if self.username.is_empty() {
            derive_username(&self.email, &self.name, &self.id)
        } else {
            self.username.clone()
        };

        ProfileView {
            id: self.id.clone(),
            name,
            username,
            profile_picture: self.profile_picture_url.clone(),
            bio: self.bio.clone(),
            followers: 0,
            following: 0,
            is_following: false,
        }
    }
}

/// Normalized, caller-facing profile. Every field is always defined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_picture: String,
    pub bio: String,
    pub followers: u64,
    pub following: u64,
    pub is_following: bool,
}

impl ProfileView {
    /// Minimal view for an identifier nothing is known about.
    #[must_use]
    pub fn placeholder(requested: &Identifier) -> Self {
        let raw = requested.as_str();
        let username = if requested.kind() == IdentifierKind::Email {
            derive_username(raw, "", raw)
        } else {
            derive_username("", raw, raw)
        };

        Self {
            id: raw.to_owned(),
            name: raw.to_owned(),
            username,
            ..Self::default()
        }
    }

    /// View used while the real profile is still loading.
    #[must_use]
    pub fn pending(id: Option<&str>, name: &str, username: &str) -> Self {
        Self {
            id: id.unwrap_or_default().to_owned(),
            name: name.to_owned(),
            username: username.to_owned(),
            ..Self::default()
        }
    }
}

/// Partial profile edit.
///
/// Serializes to the backend's `{bio?, profilePictureUrl?, fullName?}` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
}

impl ProfileUpdate {
    /// Drop fields that are empty after trimming.
    #[must_use]
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            full_name: clean(self.full_name),
            bio: clean(self.bio),
            profile_picture_url: clean(self.profile_picture_url),
        }
    }

    /// Whether the edit carries no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.bio.is_none() && self.profile_picture_url.is_none()
    }
}

/// Username fallback chain: email local part, then dotted lowercase name,
/// then `fallback`.
///
/// ```
/// use skillnet_core::derive_username;
///
/// assert_eq!(derive_username("alex@example.com", "Alex J", "id"), "alex");
/// assert_eq!(derive_username("", "Alex  Johnson", "id"), "alex.johnson");
/// assert_eq!(derive_username("", "", "id"), "id");
/// ```
#[must_use]
pub fn derive_username(email: &str, name: &str, fallback: &str) -> String {
    if let Some((local, _)) = email.split_once('@')
        && !local.is_empty()
    {
        return local.to_owned();
    }

    let dotted = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".");
    if !dotted.is_empty() {
        return dotted;
    }

    fallback.to_owned()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
