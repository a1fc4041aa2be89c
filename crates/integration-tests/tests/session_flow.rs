//! Session lifecycle against the fake backend with a file-backed store.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use secrecy::SecretString;
use skillnet_client::{FileStore, HttpUserApi, IdentityStore, ProfileService, SessionManager};
use skillnet_core::SessionState;
use skillnet_integration_tests::{FakeBackend, SeedUser, TOKEN};
use tempfile::TempDir;

const ALEX: &str = "681e3c071b66872f18bcae12";

async fn backend() -> FakeBackend {
    let backend = FakeBackend::start().await.unwrap();
    backend.seed_user(SeedUser::new(ALEX, "Alex Johnson", "alexj", "alex@example.com"));
    backend.add_credentials("alex@example.com", "hunter2", ALEX);
    backend
}

fn open_store(path: &Path) -> IdentityStore {
    IdentityStore::new(Arc::new(FileStore::open(path).unwrap()))
}

fn session(backend: &FakeBackend, store: IdentityStore) -> SessionManager<HttpUserApi> {
    let config = backend.config();
    let api = HttpUserApi::new(&config, store.clone()).unwrap();
    SessionManager::new(ProfileService::new(Arc::new(api), store), &config)
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn test_login_persists_and_restores_session() {
    let backend = backend().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("identity.json");

    let first = session(&backend, open_store(&path));
    let outcome = first
        .login_with_credentials("alex@example.com", &SecretString::from("hunter2"))
        .await;
    assert!(outcome.success);
    assert_eq!(first.current_user().unwrap().id, ALEX);
    drop(first);

    // A fresh process picks the session up from disk.
    let store = open_store(&path);
    assert!(store.has_token());
    assert_eq!(store.user_id().unwrap().as_deref(), Some(ALEX));

    let second = session(&backend, store);
    let state = second.initialize().await;
    let user = state.user().unwrap();
    assert_eq!(user.id, ALEX);
    assert_eq!(user.name, "Alex Johnson");
    assert_eq!(user.username, "alexj");
}

#[tokio::test]
async fn test_rejected_login_keeps_store_empty() {
    let backend = backend().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("identity.json");
    let session = session(&backend, open_store(&path));

    let outcome = session
        .login_with_credentials("alex@example.com", &SecretString::from("nope"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.message.as_deref(), Some("Invalid email or password"));
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(!open_store(&path).has_token());
}

#[tokio::test]
async fn test_logout_clears_disk() {
    let backend = backend().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("identity.json");
    let session = session(&backend, open_store(&path));
    session
        .login_with_credentials("alex@example.com", &SecretString::from("hunter2"))
        .await;

    session.logout().unwrap();

    assert_eq!(session.state(), SessionState::Unauthenticated);
    let store = open_store(&path);
    assert!(!store.has_token());
    assert!(store.cached_profile().unwrap().is_none());
}

// =============================================================================
// OAuth
// =============================================================================

#[tokio::test]
async fn test_oauth_callback_loads_profile_in_background() {
    let backend = backend().await;
    let dir = TempDir::new().unwrap();
    let session = session(&backend, open_store(&dir.path().join("identity.json")));

    let loading = session
        .handle_oauth_callback(&format!(
            "http://localhost:5173/oauth2/redirect?token={TOKEN}&userId={ALEX}"
        ))
        .unwrap();
    assert_eq!(loading.user().unwrap().name, "Loading...");

    let mut updates = session.subscribe();
    let loaded = tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.user().is_some_and(|u| u.name == "Alex Johnson")),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    assert_eq!(loaded.user().unwrap().id, ALEX);
    assert_eq!(backend.hits().profile.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_oauth_callback_without_user_id_asks_backend() {
    let backend = backend().await;
    let session = session(&backend, IdentityStore::in_memory());

    session.handle_oauth_callback(&format!("token={TOKEN}")).unwrap();

    let mut updates = session.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.user().is_some_and(|u| u.id == ALEX)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(backend.hits().current_user.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_oauth_callback_with_rejected_token_signs_out() {
    let backend = backend().await;
    let store = IdentityStore::in_memory();
    let session = session(&backend, store.clone());

    session.handle_oauth_callback("token=forged").unwrap();

    let mut updates = session.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| *s == SessionState::Unauthenticated),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!store.has_token());
}

// =============================================================================
// Revalidation
// =============================================================================

#[tokio::test]
async fn test_revalidate_keeps_valid_session() {
    let backend = backend().await;
    let store = IdentityStore::in_memory();
    store.set_token(TOKEN).unwrap();
    let session = session(&backend, store);

    let state = session.revalidate().await;

    assert_eq!(state.user().unwrap().id, ALEX);
}

#[tokio::test]
async fn test_revalidate_signs_out_on_rejected_token() {
    let backend = backend().await;
    let store = IdentityStore::in_memory();
    store.set_token("expired").unwrap();
    store.set_user_id(ALEX).unwrap();
    let session = session(&backend, store.clone());

    let state = session.revalidate().await;

    assert_eq!(state, SessionState::Unauthenticated);
    assert!(!store.has_token());
    assert!(store.user_id().unwrap().is_none());
}

#[tokio::test]
async fn test_revalidate_ignores_unreachable_backend() {
    let backend = backend().await;
    let config = backend.config();
    backend.shutdown();
    drop(backend);

    let store = IdentityStore::in_memory();
    store.set_token(TOKEN).unwrap();
    let api = HttpUserApi::new(&config, store.clone()).unwrap();
    let session = SessionManager::new(ProfileService::new(Arc::new(api), store.clone()), &config);

    session.revalidate().await;

    assert!(store.has_token());
}
