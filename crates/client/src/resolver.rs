//! Identity resolution.
//!
//! Picks the identifier to send to the API for a loosely-typed candidate.
//! Canonical ids always win over human-readable aliases. No I/O happens here.

use skillnet_core::{CachedProfile, Identifier};

/// Best identifier to use against the API for `candidate`.
///
/// - A canonical candidate is returned unchanged.
/// - A candidate naming the cached user (by display name or username) resolves
///   to the cached canonical id, when the cache holds one.
/// - Anything else is returned verbatim, to be tried as a direct lookup key.
#[must_use]
pub fn resolve_api_identifier(candidate: &Identifier, cached: Option<&CachedProfile>) -> String {
    if candidate.is_canonical() {
        return candidate.as_str().to_owned();
    }

    if let Some(cached) = cached
        && let Some(canonical) = cached.canonical_id()
        && (candidate.eq_ignore_case(&cached.name) || candidate.eq_ignore_case(&cached.username))
    {
        return canonical.into_inner();
    }

    candidate.as_str().to_owned()
}

/// Ordered, de-duplicated list of ids to query for `requested`.
///
/// 1. the resolver's choice
/// 2. the requested identifier verbatim
/// 3. the cached canonical id, when the cache matches by name, username or email
pub(crate) fn lookup_candidates(
    requested: &Identifier,
    cached: Option<&CachedProfile>,
) -> Vec<String> {
    let mut candidates = Vec::with_capacity(3);
    let mut push = |id: String| {
        if !candidates.contains(&id) {
            candidates.push(id);
        }
    };

    push(resolve_api_identifier(requested, cached));
    push(requested.as_str().to_owned());

    if let Some(cached) = cached
        && cached.matches_alias(requested)
        && let Some(canonical) = cached.canonical_id()
    {
        push(canonical.into_inner());
    }

    candidates
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEX: &str = "681e3c071b66872f18bcae12";

    fn cached(id: &str) -> CachedProfile {
        CachedProfile {
            id: id.to_string(),
            name: "Alex Johnson".to_string(),
            username: "alexj".to_string(),
            email: "alex@example.com".to_string(),
            ..CachedProfile::default()
        }
    }

    fn ident(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn test_canonical_candidates_are_returned_unchanged() {
        for candidate in [HEX, "ABCDEFABCDEFABCDEFABCDEF", "000000000000000000000000"] {
            assert_eq!(resolve_api_identifier(&ident(candidate), None), candidate);
            assert_eq!(
                resolve_api_identifier(&ident(candidate), Some(&cached(HEX))),
                candidate
            );
        }
    }

    #[test]
    fn test_name_and_username_resolve_to_cached_canonical_id() {
        let cache = cached(HEX);
        for candidate in ["Alex Johnson", "alex johnson", "ALEXJ", "alexj"] {
            assert_eq!(resolve_api_identifier(&ident(candidate), Some(&cache)), HEX);
        }
    }

    #[test]
    fn test_non_canonical_cached_id_is_not_used() {
        let cache = cached("alex-legacy-id");
        assert_eq!(
            resolve_api_identifier(&ident("alexj"), Some(&cache)),
            "alexj"
        );
    }

    #[test]
    fn test_email_does_not_resolve_directly() {
        let cache = cached(HEX);
        assert_eq!(
            resolve_api_identifier(&ident("alex@example.com"), Some(&cache)),
            "alex@example.com"
        );
    }

    #[test]
    fn test_unknown_candidate_is_verbatim() {
        assert_eq!(
            resolve_api_identifier(&ident("someone"), Some(&cached(HEX))),
            "someone"
        );
    }

    #[test]
    fn test_lookup_candidates_order() {
        let cache = cached(HEX);

        assert_eq!(lookup_candidates(&ident(HEX), Some(&cache)), vec![HEX]);
        assert_eq!(
            lookup_candidates(&ident("alexj"), Some(&cache)),
            vec![HEX.to_string(), "alexj".to_string()]
        );
        assert_eq!(
            lookup_candidates(&ident("alex@example.com"), Some(&cache)),
            vec!["alex@example.com".to_string(), HEX.to_string()]
        );
        assert_eq!(lookup_candidates(&ident("someone"), None), vec!["someone"]);
    }
}
