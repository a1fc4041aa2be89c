//! Session lifecycle state and OAuth providers.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::profile::ProfileView;

/// Authentication state of the client.
///
/// `Unauthenticated -> Pending -> Authenticated`, and back to
/// `Unauthenticated` on logout or invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// A token is held and the profile is being resolved.
    Pending,
    Authenticated(ProfileView),
}

impl SessionState {
    /// The signed-in user's profile, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&ProfileView> {
        match self {
            Self::Authenticated(view) => Some(view),
            Self::Unauthenticated | Self::Pending => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// External identity provider for the redirect login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    /// Path segment used by the backend's authorization endpoint.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(format!("unknown OAuth provider: {other}")),
        }
    }
}
