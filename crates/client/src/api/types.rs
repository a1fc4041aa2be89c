//! Wire shapes and their normalization.
//!
//! The backend names the same concept differently depending on the endpoint
//! (`fullName`/`name`, `userId`/`id`, `following`/`isFollowing`) and sometimes
//! sends ids as numbers. Everything is funneled through [`ProfileRecord`] so
//! nothing past this module looks at raw field names.

use serde::{Deserialize, Deserializer, Serialize};

/// Profile as returned by any of the user endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileResponse {
    #[serde(deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    user_id: Option<String>,
    full_name: Option<String>,
    name: Option<String>,
    username: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    profile_picture_url: Option<String>,
    follower_count: Option<u64>,
    following_count: Option<u64>,
    #[serde(deserialize_with = "lenient_following")]
    following: Following,
    is_following: Option<bool>,
}

/// `following` is a flag on most endpoints but a count on some.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Following {
    #[default]
    Absent,
    Flag(bool),
    Count(u64),
}

/// Normalized profile record. `None` means the backend did not say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ProfileResponse")]
pub struct ProfileRecord {
    /// `userId` as sent, kept apart for the username fallback chain.
    pub user_id: Option<String>,
    /// `userId`, falling back to `id`.
    pub id: Option<String>,
    /// `fullName`, falling back to `name`.
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
    /// Set when either `following` or `isFollowing` says so.
    pub is_following: Option<bool>,
}

impl From<ProfileResponse> for ProfileRecord {
    fn from(wire: ProfileResponse) -> Self {
        let user_id = present(wire.user_id);
        let id = user_id.clone().or_else(|| present(wire.id));
        let (flag, following_count) = match wire.following {
            Following::Flag(flag) => (Some(flag), None),
            Following::Count(count) => (None, Some(count)),
            Following::Absent => (None, None),
        };

        Self {
            user_id,
            id,
            name: present(wire.full_name).or_else(|| present(wire.name)),
            username: present(wire.username),
            email: present(wire.email),
            bio: present(wire.bio),
            profile_picture_url: present(wire.profile_picture_url),
            follower_count: wire.follower_count,
            following_count: wire.following_count.or(following_count),
            is_following: flag.into_iter().chain(wire.is_following).reduce(|a, b| a || b),
        }
    }
}

impl ProfileRecord {
    /// A record with neither id nor name identifies nobody.
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.username.is_none()
    }
}

/// Body of `POST auth/login`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of `POST auth/login`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    pub success: bool,
    pub token: Option<String>,
    pub user: Option<ProfileRecord>,
    pub message: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accept ids sent as strings or numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_following<'de, D>(deserializer: D) -> Result<Following, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(flag)) => Following::Flag(flag),
        Some(serde_json::Value::Number(n)) => {
            n.as_u64().map_or(Following::Absent, Following::Count)
        }
        _ => Following::Absent,
    })
}
