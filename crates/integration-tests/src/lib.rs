//! Integration tests for the SkillNet client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p skillnet-integration-tests
//! ```
//!
//! Every test starts its own [`FakeBackend`]: an `axum` server on an ephemeral
//! localhost port speaking the SkillNet REST dialect. Tests drive the real
//! `HttpUserApi` against it and inspect the per-route hit counters and the
//! headers it saw.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use skillnet_client::ClientConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Token the backend hands out and accepts.
pub const TOKEN: &str = "integration-token";

/// Settle delay used by tests that exercise follow reconciliation.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// A user known to the fake backend.
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub id: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub bio: String,
}

impl SeedUser {
    #[must_use]
    pub fn new(id: &str, full_name: &str, username: &str, email: &str) -> Self {
        Self {
            id: id.to_owned(),
            full_name: full_name.to_owned(),
            username: username.to_owned(),
            email: email.to_owned(),
            bio: String::new(),
        }
    }

    fn answers_to(&self, key: &str) -> bool {
        self.id == key
            || self.username.eq_ignore_ascii_case(key)
            || self.email.eq_ignore_ascii_case(key)
            || self.full_name.eq_ignore_ascii_case(key)
    }
}

/// Per-route request counters.
#[derive(Debug, Default)]
pub struct Hits {
    pub profile: AtomicUsize,
    pub user: AtomicUsize,
    pub update: AtomicUsize,
    pub list: AtomicUsize,
    pub status: AtomicUsize,
    pub follow: AtomicUsize,
    pub unfollow: AtomicUsize,
    pub login: AtomicUsize,
    pub current_user: AtomicUsize,
}

impl Hits {
    #[must_use]
    pub fn total(&self) -> usize {
        [
            &self.profile,
            &self.user,
            &self.update,
            &self.list,
            &self.status,
            &self.follow,
            &self.unfollow,
            &self.login,
            &self.current_user,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// Headers of one request as the backend saw them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub requested_with: Option<String>,
}

#[derive(Default)]
struct Backend {
    users: Mutex<Vec<SeedUser>>,
    /// Users only reachable through `GET users/{id}`, sent in the legacy shape.
    legacy: Mutex<HashMap<String, Value>>,
    /// `(follower, target)` pairs.
    follows: Mutex<HashSet<(String, String)>>,
    credentials: Mutex<HashMap<String, (String, String)>>,
    seen: Mutex<Vec<SeenRequest>>,
    fail_follows: AtomicBool,
    hits: Hits,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Backend {
    fn find(&self, key: &str) -> Option<SeedUser> {
        let decoded = key.trim();
        lock(&self.users)
            .iter()
            .find(|u| u.answers_to(decoded))
            .cloned()
    }

    fn render(&self, user: &SeedUser, viewer: Option<&str>) -> Value {
        let follows = lock(&self.follows);
        let followers = follows.iter().filter(|(_, t)| *t == user.id).count();
        let following = follows.iter().filter(|(f, _)| *f == user.id).count();

        let mut body = json!({
            "id": format!("profile-{}", user.id),
            "userId": user.id,
            "fullName": user.full_name,
            "username": user.username,
            "email": user.email,
            "bio": user.bio,
            "profilePictureUrl": "",
            "followerCount": followers,
            "followingCount": following,
        });
        if let Some(viewer) = viewer {
            body["following"] = json!(follows.contains(&(viewer.to_owned(), user.id.clone())));
        }
        body
    }

    fn record(&self, path: String, headers: &HeaderMap) {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        lock(&self.seen).push(SeenRequest {
            path,
            authorization: text("authorization"),
            requested_with: text("x-requested-with"),
        });
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {TOKEN}"))
    }
}

type Shared = Arc<Backend>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "User not found" }))).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewerQuery {
    current_user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetQuery {
    target_user_id: String,
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    full_name: Option<String>,
    bio: Option<String>,
}

async fn get_profile(
    State(b): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    b.hits.profile.fetch_add(1, Ordering::SeqCst);
    b.record(format!("users/{id}/profile"), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    match b.find(&id) {
        Some(user) => Json(b.render(&user, None)).into_response(),
        None => not_found(),
    }
}

async fn get_user(State(b): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hits.user.fetch_add(1, Ordering::SeqCst);
    b.record(format!("users/{id}"), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    let legacy = lock(&b.legacy).get(&id).cloned();
    match legacy {
        Some(body) => Json(body).into_response(),
        None => not_found(),
    }
}

async fn put_profile(
    State(b): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Response {
    b.hits.update.fetch_add(1, Ordering::SeqCst);
    b.record(format!("users/{id}/profile"), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    let updated = {
        let mut users = lock(&b.users);
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return not_found();
        };
        if let Some(name) = body.full_name {
            user.full_name = name;
        }
        if let Some(bio) = body.bio {
            user.bio = bio;
        }
        user.clone()
    };
    Json(b.render(&updated, None)).into_response()
}

async fn list_users(
    State(b): State<Shared>,
    Query(q): Query<ViewerQuery>,
    headers: HeaderMap,
) -> Response {
    b.hits.list.fetch_add(1, Ordering::SeqCst);
    b.record("users".to_owned(), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    let users = lock(&b.users).clone();
    let body: Vec<Value> = users
        .iter()
        .map(|u| b.render(u, q.current_user_id.as_deref()))
        .collect();
    Json(body).into_response()
}

async fn profile_with_status(
    State(b): State<Shared>,
    Path(id): Path<String>,
    Query(q): Query<ViewerQuery>,
    headers: HeaderMap,
) -> Response {
    b.hits.status.fetch_add(1, Ordering::SeqCst);
    b.record(format!("users/{id}/profile-with-status"), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    match b.find(&id) {
        Some(user) => Json(b.render(&user, q.current_user_id.as_deref())).into_response(),
        None => not_found(),
    }
}

fn change_follow(b: &Backend, follower: String, target: String, follow: bool) -> Response {
    if b.fail_follows.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Follow service unavailable" })),
        )
            .into_response();
    }
    let mut follows = lock(&b.follows);
    if follow {
        follows.insert((follower, target));
    } else {
        follows.remove(&(follower, target));
    }
    StatusCode::OK.into_response()
}

async fn follow(
    State(b): State<Shared>,
    Path(follower): Path<String>,
    Query(q): Query<TargetQuery>,
    headers: HeaderMap,
) -> Response {
    b.hits.follow.fetch_add(1, Ordering::SeqCst);
    b.record(format!("users/{follower}/follow"), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    change_follow(&b, follower, q.target_user_id, true)
}

async fn unfollow(
    State(b): State<Shared>,
    Path(follower): Path<String>,
    Query(q): Query<TargetQuery>,
    headers: HeaderMap,
) -> Response {
    b.hits.unfollow.fetch_add(1, Ordering::SeqCst);
    b.record(format!("users/{follower}/unfollow"), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    change_follow(&b, follower, q.target_user_id, false)
}

async fn login(
    State(b): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Response {
    b.hits.login.fetch_add(1, Ordering::SeqCst);
    b.record("auth/login".to_owned(), &headers);
    let user_id = lock(&b.credentials)
        .get(&body.email)
        .filter(|(password, _)| *password == body.password)
        .map(|(_, id)| id.clone());

    match user_id.and_then(|id| b.find(&id)) {
        Some(user) => Json(json!({
            "success": true,
            "token": TOKEN,
            "user": { "id": user.id, "name": user.full_name, "email": user.email },
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid email or password" })),
        )
            .into_response(),
    }
}

async fn current_user(State(b): State<Shared>, headers: HeaderMap) -> Response {
    b.hits.current_user.fetch_add(1, Ordering::SeqCst);
    b.record("oauth2/user".to_owned(), &headers);
    if !Backend::authorized(&headers) {
        return unauthorized();
    }
    let first = lock(&b.users).first().cloned();
    match first {
        Some(user) => Json(b.render(&user, None)).into_response(),
        None => Json(json!({})).into_response(),
    }
}

/// Fake SkillNet backend bound to an ephemeral port.
///
/// The server task is aborted when the value is dropped.
pub struct FakeBackend {
    backend: Shared,
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start serving on `127.0.0.1:0`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let backend: Shared = Arc::new(Backend::default());
        let api = Router::new()
            .route("/users", get(list_users))
            .route("/users/{id}", get(get_user))
            .route("/users/{id}/profile", get(get_profile).put(put_profile))
            .route("/users/{id}/profile-with-status", get(profile_with_status))
            .route("/users/{id}/follow", post(follow))
            .route("/users/{id}/unfollow", post(unfollow))
            .route("/auth/login", post(login))
            .route("/oauth2/user", get(current_user));
        let app = Router::new()
            .nest("/api", api)
            .with_state(Arc::clone(&backend));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake backend stopped");
            }
        });

        Ok(Self {
            backend,
            addr,
            server,
        })
    }

    /// `http://127.0.0.1:{port}/api`
    #[must_use]
    pub fn api_base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Never in practice: the base URL is always a valid URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::with_api_base_url(&self.api_base_url())
            .expect("fake backend URL is valid");
        config.request_timeout = Duration::from_secs(5);
        config.follow_settle_delay = SETTLE_DELAY;
        config
    }

    pub fn seed_user(&self, user: SeedUser) {
        lock(&self.backend.users).push(user);
    }

    /// Serve `body` only at `GET users/{id}`.
    pub fn seed_legacy_user(&self, id: &str, body: Value) {
        lock(&self.backend.legacy).insert(id.to_owned(), body);
    }

    pub fn add_credentials(&self, email: &str, password: &str, user_id: &str) {
        lock(&self.backend.credentials)
            .insert(email.to_owned(), (password.to_owned(), user_id.to_owned()));
    }

    pub fn set_follow(&self, follower: &str, target: &str) {
        lock(&self.backend.follows).insert((follower.to_owned(), target.to_owned()));
    }

    pub fn fail_follows(&self, fail: bool) {
        self.backend.fail_follows.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn hits(&self) -> &Hits {
        &self.backend.hits
    }

    #[must_use]
    pub fn seen(&self) -> Vec<SeenRequest> {
        lock(&self.backend.seen).clone()
    }

    /// Stop serving; later requests fail with a connection error.
    pub fn shutdown(&self) {
        self.server.abort();
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}
