//! User identifiers.
//!
//! A SkillNet user can be referred to by several surface forms: the backend's
//! canonical 24-character hexadecimal ID, a username, an email address, or a
//! display name. [`Identifier`] accepts any of them; [`CanonicalId`] only
//! accepts the canonical form.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The input is empty or only whitespace.
    #[error("identifier cannot be empty")]
    Empty,
    /// The input is not a 24-character hexadecimal string.
    #[error("`{0}` is not a canonical 24-character hex id")]
    NotCanonical(String),
}

/// The backend's stable identifier for a user.
///
/// ## Constraints
///
/// - Exactly 24 characters
/// - ASCII hexadecimal digits only (either case)
///
/// ## Examples
///
/// ```
/// use skillnet_core::CanonicalId;
///
/// assert!(CanonicalId::parse("681e3c071b66872f18bcae12").is_ok());
/// assert!(CanonicalId::parse("alexj").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Length of a canonical id.
    pub const LENGTH: usize = 24;

    /// Parse a `CanonicalId` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::NotCanonical`] if the input is not 24 hex characters.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        if Self::is_canonical(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(IdentifierError::NotCanonical(s.to_owned()))
        }
    }

    /// Whether `s` has the canonical shape.
    #[must_use]
    pub fn is_canonical(s: &str) -> bool {
        s.len() == Self::LENGTH && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_canonical(&value) {
            Ok(Self(value))
        } else {
            Err(IdentifierError::NotCanonical(value))
        }
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The surface form of an [`Identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    /// 24-character hex id.
    Canonical,
    /// Something shaped like `local@domain`.
    Email,
    /// Username, display name, or any other opaque key.
    Name,
}

/// A loosely-typed, non-empty user lookup key.
///
/// Surrounding whitespace is trimmed on parse; the remaining text is kept as-is
/// so it can be sent to the backend verbatim.
///
/// ```
/// use skillnet_core::{Identifier, IdentifierKind};
///
/// let id = Identifier::parse("  Alex Johnson ").unwrap();
/// assert_eq!(id.as_str(), "Alex Johnson");
/// assert_eq!(id.kind(), IdentifierKind::Name);
/// assert!(Identifier::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse an `Identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] for empty or whitespace-only input.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the identifier's surface form.
    #[must_use]
    pub fn kind(&self) -> IdentifierKind {
        if CanonicalId::is_canonical(&self.0) {
            IdentifierKind::Canonical
        } else if looks_like_email(&self.0) {
            IdentifierKind::Email
        } else {
            IdentifierKind::Name
        }
    }

    /// Whether this identifier is already in canonical form.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.kind() == IdentifierKind::Canonical
    }

    /// The canonical id, if this identifier is one.
    #[must_use]
    pub fn as_canonical(&self) -> Option<CanonicalId> {
        CanonicalId::parse(&self.0).ok()
    }

    /// Case-insensitive comparison against an alias.
    #[must_use]
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        !other.is_empty() && self.0.to_lowercase() == other.to_lowercase()
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl From<CanonicalId> for Identifier {
    fn from(id: CanonicalId) -> Self {
        Self(id.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEX: &str = "681e3c071b66872f18bcae12";

    #[test]
    fn test_canonical_accepts_hex_of_either_case() {
        assert!(CanonicalId::parse(HEX).is_ok());
        assert!(CanonicalId::parse(&HEX.to_uppercase()).is_ok());
    }

    #[test]
    fn test_canonical_rejects_wrong_length_or_chars() {
        assert!(CanonicalId::parse(&HEX[..23]).is_err());
        assert!(CanonicalId::parse(&format!("{HEX}0")).is_err());
        assert!(CanonicalId::parse("681e3c071b66872f18bcae1z").is_err());
        assert!(CanonicalId::parse("").is_err());
    }

    #[test]
    fn test_identifier_rejects_empty() {
        assert_eq!(Identifier::parse(""), Err(IdentifierError::Empty));
        assert_eq!(Identifier::parse(" \t "), Err(IdentifierError::Empty));
    }

    #[test]
    fn test_identifier_kind() {
        assert_eq!(Identifier::parse(HEX).unwrap().kind(), IdentifierKind::Canonical);
        assert_eq!(
            Identifier::parse("alex@example.com").unwrap().kind(),
            IdentifierKind::Email
        );
        assert_eq!(Identifier::parse("alexj").unwrap().kind(), IdentifierKind::Name);
        assert_eq!(Identifier::parse("@alexj").unwrap().kind(), IdentifierKind::Name);
        assert_eq!(Identifier::parse("u42").unwrap().kind(), IdentifierKind::Name);
    }

    #[test]
    fn test_eq_ignore_case() {
        let id = Identifier::parse("Alex Johnson").unwrap();
        assert!(id.eq_ignore_case("alex johnson"));
        assert!(!id.eq_ignore_case("alexj"));
        assert!(!id.eq_ignore_case(""));
    }

    #[test]
    fn test_serde_rejects_non_canonical() {
        let ok: Result<CanonicalId, _> = serde_json::from_str(&format!("\"{HEX}\""));
        assert!(ok.is_ok());
        let bad: Result<CanonicalId, _> = serde_json::from_str("\"alexj\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_canonical_into_identifier() {
        let id: Identifier = CanonicalId::parse(HEX).unwrap().into();
        assert!(id.is_canonical());
        assert_eq!(id.as_canonical().unwrap().as_str(), HEX);
    }
}
