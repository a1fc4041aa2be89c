//! Profile resolution, editing and follow sync against the fake backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use skillnet_client::{
    ClientConfig, ClientError, Durability, FollowSynchronizer, HttpUserApi, IdentityStore,
    LocalOnlyReason, ProfileService,
};
use skillnet_core::{CachedProfile, Identifier, ProfileUpdate};
use skillnet_integration_tests::{FakeBackend, SETTLE_DELAY, SeedUser, TOKEN};

const ALEX: &str = "681e3c071b66872f18bcae12";
const SAM: &str = "5f1d7a2b9c3e4f5a6b7c8d9e";

async fn backend() -> FakeBackend {
    let backend = FakeBackend::start().await.unwrap();
    backend.seed_user(SeedUser::new(ALEX, "Alex Johnson", "alexj", "alex@example.com"));
    backend.seed_user(SeedUser::new(SAM, "Sam Rivera", "samr", "sam@example.com"));
    backend
}

fn alex_snapshot() -> CachedProfile {
    CachedProfile {
        id: ALEX.to_string(),
        name: "Alex Johnson".to_string(),
        username: "alexj".to_string(),
        email: "alex@example.com".to_string(),
        bio: "Cached bio".to_string(),
        profile_picture_url: String::new(),
    }
}

/// Alex signed in, with a cached snapshot.
fn signed_in_store() -> IdentityStore {
    let store = IdentityStore::in_memory();
    store.set_token(TOKEN).unwrap();
    store.set_user_id(ALEX).unwrap();
    store.save_cached_profile(&alex_snapshot()).unwrap();
    store
}

fn service(config: &ClientConfig, store: IdentityStore) -> ProfileService<HttpUserApi> {
    let api = HttpUserApi::new(config, store.clone()).unwrap();
    ProfileService::new(Arc::new(api), store)
}

fn id(s: &str) -> Identifier {
    Identifier::parse(s).unwrap()
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_fetch_by_display_name_prefers_canonical_id() {
    let backend = backend().await;
    let profiles = service(&backend.config(), signed_in_store());

    let view = profiles.fetch_profile(&id("Alex Johnson")).await;

    assert_eq!(view.id, ALEX);
    assert_eq!(view.name, "Alex Johnson");
    // The cached user's canonical id is tried before the display name.
    assert_eq!(backend.seen().first().unwrap().path, format!("users/{ALEX}/profile"));
}

#[tokio::test]
async fn test_fetch_other_user_leaves_snapshot_alone() {
    let backend = backend().await;
    let store = signed_in_store();
    let profiles = service(&backend.config(), store.clone());

    let view = profiles.fetch_profile(&id(SAM)).await;

    assert_eq!(view.name, "Sam Rivera");
    assert_eq!(store.cached_profile().unwrap().unwrap(), alex_snapshot());
}

#[tokio::test]
async fn test_unreachable_backend_serves_cache() {
    let backend = backend().await;
    let config = backend.config();
    backend.shutdown();
    drop(backend);

    let profiles = service(&config, signed_in_store());
    let view = profiles.fetch_profile(&id("Alex Johnson")).await;

    assert_eq!(view.id, ALEX);
    assert_eq!(view.bio, "Cached bio");
}

#[tokio::test]
async fn test_unknown_user_gets_placeholder() {
    let backend = backend().await;
    let profiles = service(&backend.config(), signed_in_store());

    let view = profiles.fetch_profile(&id("Nobody Here")).await;

    assert_eq!(view.id, "Nobody Here");
    assert_eq!(view.followers, 0);
}

#[tokio::test]
async fn test_list_users_passes_viewer() {
    let backend = backend().await;
    backend.set_follow(ALEX, SAM);
    let profiles = service(&backend.config(), signed_in_store());

    let users = profiles.list_users().await;

    assert_eq!(users.len(), 2);
    let sam = users.iter().find(|u| u.id == SAM).unwrap();
    assert!(sam.is_following);
    assert_eq!(sam.followers, 1);
}

// =============================================================================
// Editing
// =============================================================================

#[tokio::test]
async fn test_update_is_synced_and_cached() {
    let backend = backend().await;
    let store = signed_in_store();
    let profiles = service(&backend.config(), store.clone());

    let outcome = profiles
        .update_profile(
            &id(ALEX),
            ProfileUpdate {
                full_name: Some("Alex J.".to_string()),
                bio: Some("Rust learner".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.durability, Durability::Synced);
    assert_eq!(outcome.view.name, "Alex J.");
    let cached = store.cached_profile().unwrap().unwrap();
    assert_eq!(cached.name, "Alex J.");
    assert_eq!(cached.bio, "Rust learner");
    assert_eq!(backend.hits().update.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_when_backend_is_down_stays_local() {
    let backend = backend().await;
    let config = backend.config();
    backend.shutdown();
    drop(backend);

    let store = signed_in_store();
    let profiles = service(&config, store.clone());
    let outcome = profiles
        .update_profile(
            &id(ALEX),
            ProfileUpdate {
                bio: Some("Offline edit".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        outcome.durability,
        Durability::LocalOnly(LocalOnlyReason::Remote(ref e)) if e.is_network()
    ));
    assert_eq!(store.cached_profile().unwrap().unwrap().bio, "Offline edit");
}

// =============================================================================
// Following
// =============================================================================

#[tokio::test]
async fn test_follow_reconciles_with_backend() {
    let backend = backend().await;
    let config = backend.config();
    let profiles = service(&config, signed_in_store());
    let follows = FollowSynchronizer::new(profiles, &config);
    let sam = id(SAM);

    let optimistic = follows.toggle_follow(&sam).await.unwrap();
    assert!(optimistic.is_following);
    assert_eq!(optimistic.followers, 1);
    assert_eq!(backend.hits().follow.load(Ordering::SeqCst), 1);

    tokio::time::sleep(SETTLE_DELAY * 6).await;

    assert_eq!(backend.hits().status.load(Ordering::SeqCst), 1);
    let settled = follows.state(&sam).unwrap();
    assert!(settled.is_following);
    assert_eq!(settled.followers, 1);
}

#[tokio::test]
async fn test_reconciliation_corrects_stale_count() {
    let backend = backend().await;
    // Someone else already follows Sam; the client does not know.
    backend.set_follow("someone-else", SAM);
    let config = backend.config();
    let follows = FollowSynchronizer::new(service(&config, signed_in_store()), &config);
    let sam = id(SAM);

    let optimistic = follows.toggle_follow(&sam).await.unwrap();
    assert_eq!(optimistic.followers, 1);

    tokio::time::sleep(SETTLE_DELAY * 6).await;

    assert_eq!(follows.state(&sam).unwrap().followers, 2);
}

#[tokio::test]
async fn test_failed_follow_rolls_back() {
    let backend = backend().await;
    backend.fail_follows(true);
    let config = backend.config();
    let follows = FollowSynchronizer::new(service(&config, signed_in_store()), &config);
    let sam = id(SAM);

    let err = follows.toggle_follow(&sam).await.unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert!(follows.state(&sam).is_none());
    assert!(!follows.is_in_flight(&sam));

    tokio::time::sleep(SETTLE_DELAY * 4).await;
    assert_eq!(backend.hits().status.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unfollow_after_observe() {
    let backend = backend().await;
    backend.set_follow(ALEX, SAM);
    let config = backend.config();
    let profiles = service(&config, signed_in_store());
    let follows = FollowSynchronizer::new(profiles.clone(), &config);
    let sam = id(SAM);

    let view = profiles.fetch_profile_with_status(&sam, ALEX).await.unwrap();
    follows.observe(&sam, &view);
    let state = follows.toggle_follow(&sam).await.unwrap();

    assert!(!state.is_following);
    assert_eq!(state.followers, 0);
    assert_eq!(backend.hits().unfollow.load(Ordering::SeqCst), 1);
}
