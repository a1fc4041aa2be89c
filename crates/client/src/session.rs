//! Session lifecycle.
//!
//! [`SessionManager`] owns the `Unauthenticated -> Pending -> Authenticated`
//! state machine and publishes every transition on a `tokio::sync::watch`
//! channel. Credentials live in the [`IdentityStore`]; the manager never holds
//! a token itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use secrecy::SecretString;
use skillnet_core::{OAuthProvider, ProfileView, SessionState};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::api::{ApiError, UserApi};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::profile::{ProfileService, Source};
use crate::store::IdentityStore;

const DEFAULT_LOGIN_ERROR: &str = "An error occurred during login";
const LOADING_NAME: &str = "Loading...";

/// Result of [`SessionManager::login_with_credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub success: bool,
    /// Why the login failed; `None` on success.
    pub message: Option<String>,
}

impl LoginOutcome {
    const fn succeeded() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn failed(message: Option<&str>) -> Self {
        Self {
            success: false,
            message: Some(message.unwrap_or(DEFAULT_LOGIN_ERROR).to_string()),
        }
    }
}

/// Placeholder for a signed-in user nothing is known about.
fn unknown_user() -> ProfileView {
    ProfileView::pending(None, "User", "user")
}

/// Owns the signed-in state.
///
/// Dropping the manager aborts any background profile load it started.
pub struct SessionManager<A: UserApi + 'static> {
    inner: Arc<SessionInner<A>>,
}

struct SessionInner<A> {
    profiles: ProfileService<A>,
    oauth_base_url: Url,
    oauth_redirect_uri: String,
    state: watch::Sender<SessionState>,
    background: Mutex<Option<AbortHandle>>,
}

impl<A: UserApi + 'static> std::fmt::Debug for SessionManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<A: UserApi + 'static> SessionManager<A> {
    /// Create an unauthenticated manager. Call [`Self::initialize`] to pick up
    /// a persisted session.
    #[must_use]
    pub fn new(profiles: ProfileService<A>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            inner: Arc::new(SessionInner {
                profiles,
                oauth_base_url: config.oauth_base_url.clone(),
                oauth_redirect_uri: config.oauth_redirect_uri.clone(),
                state,
                background: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileService<A> {
        &self.inner.profiles
    }

    fn store(&self) -> &IdentityStore {
        self.inner.profiles.store()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The signed-in user's view, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<ProfileView> {
        self.inner.state.borrow().user().cloned()
    }

    /// Restore a persisted session.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionState {
        if !self.store().has_token() {
            debug!("No stored token");
            self.inner.publish(SessionState::Unauthenticated);
            return self.state();
        }

        self.inner.publish(SessionState::Pending);

        match load_signed_in_user(&self.inner.profiles).await {
            Ok(view) => {
                info!(user_id = %view.id, "Session restored");
                self.inner.publish(SessionState::Authenticated(view));
            }
            Err(e) => {
                warn!(error = %e, "Stored token was rejected");
                self.inner.invalidate();
            }
        }
        self.state()
    }

    /// Sign in with email and password.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login_with_credentials(
        &self,
        email: &str,
        password: &SecretString,
    ) -> LoginOutcome {
        let response = match self.inner.profiles.api().login(email, password).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login request failed");
                return LoginOutcome::failed(e.server_message());
            }
        };

        let token = response.token.as_deref().filter(|t| !t.is_empty());
        let Some(token) = token.filter(|_| response.success) else {
            info!("Login rejected");
            return LoginOutcome::failed(response.message.as_deref());
        };

        if let Err(e) = self.store().set_token(token) {
            error!(error = %e, "Failed to persist token");
            return LoginOutcome::failed(None);
        }
        let user_id = response.user.as_ref().and_then(|u| u.id.as_deref());
        if let Err(e) = self.inner.profiles.switch_user(user_id) {
            error!(error = %e, "Failed to persist user id");
            return LoginOutcome::failed(None);
        }

        let view = match &response.user {
            Some(user) => self.inner.profiles.adopt_current_user(user),
            None => load_signed_in_user(&self.inner.profiles)
                .await
                .unwrap_or_else(|_| unknown_user()),
        };

        info!(user_id = %view.id, "Logged in");
        self.inner.abort_background();
        self.inner.publish(SessionState::Authenticated(view));
        LoginOutcome::succeeded()
    }

    /// URL that starts the OAuth flow for `provider`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::OAuth` if the configured base URL cannot be joined.
    pub fn authorization_url(&self, provider: OAuthProvider) -> Result<Url> {
        let mut url = self
            .inner
            .oauth_base_url
            .join(&format!("oauth2/authorization/{provider}"))
            .map_err(|e| ClientError::OAuth(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", &self.inner.oauth_redirect_uri);
        Ok(url)
    }

    /// Complete an OAuth redirect.
    ///
    /// `query` is the redirect's query string, with or without the leading
    /// `?`, or the full redirect URL. The session becomes authenticated with a
    /// loading placeholder at once; the real profile is loaded in the
    /// background and published when it arrives.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::OAuth` when the redirect carries an error or no
    /// token, and `ClientError::Store` if the token cannot be persisted.
    #[instrument(skip(self, query))]
    pub fn handle_oauth_callback(&self, query: &str) -> Result<SessionState> {
        let query = query.split_once('?').map_or(query, |(_, q)| q);
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        if let Some(message) = params.get("error") {
            warn!(error = %message, "OAuth provider returned an error");
            return Err(ClientError::OAuth(message.clone()));
        }

        let Some(token) = params.get("token").filter(|t| !t.is_empty()) else {
            warn!("OAuth redirect carried no token");
            return Err(ClientError::OAuth("Invalid response".to_string()));
        };

        let user_id = params.get("userId").filter(|id| !id.is_empty());
        self.store().set_token(token)?;
        self.inner.profiles.switch_user(user_id.map(String::as_str))?;

        let loading = ProfileView::pending(user_id.map(String::as_str), LOADING_NAME, "loading");
        self.inner.publish(SessionState::Authenticated(loading));
        info!("OAuth login accepted; loading profile");

        self.inner.spawn_profile_load();
        Ok(self.state())
    }

    /// Re-run the pipeline for the signed-in user.
    ///
    /// Keeps the last known view when nothing better could be found.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> SessionState {
        if !self.store().has_token() {
            return self.state();
        }
        let Some(me) = self.inner.profiles.current_identity() else {
            debug!("No identity to refresh");
            return self.state();
        };

        let (view, source) = self.inner.profiles.load_current_user(&me).await;
        match source {
            Source::Placeholder if self.state().is_authenticated() => {
                debug!("Refresh found nothing; keeping last known profile");
            }
            _ => self.inner.publish(SessionState::Authenticated(view)),
        }
        self.state()
    }

    /// Ask the backend whether the token is still good.
    ///
    /// A 401/403 ends the session; any other failure is ignored.
    #[instrument(skip(self))]
    pub async fn revalidate(&self) -> SessionState {
        if !self.store().has_token() {
            return self.state();
        }

        match self.inner.profiles.api().current_user().await {
            Ok(Some(record)) => {
                let view = self.inner.profiles.adopt_current_user(&record);
                self.inner.publish(SessionState::Authenticated(view));
            }
            Ok(None) => debug!("Token accepted; no user payload"),
            Err(e) if e.is_auth() => {
                warn!(error = %e, "Session invalidated by backend");
                self.inner.invalidate();
            }
            Err(e) => debug!(error = %e, "Revalidation failed; ignoring"),
        }
        self.state()
    }

    /// Forget the signed-in user.
    ///
    /// The state becomes `Unauthenticated` even when the store cannot be cleared.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Store` if the persisted credentials could not be removed.
    pub fn logout(&self) -> Result<()> {
        self.inner.abort_background();
        let cleared = self.store().clear();
        self.inner.publish(SessionState::Unauthenticated);
        info!("Logged out");
        cleared.map_err(Into::into)
    }
}

impl<A: UserApi + 'static> Drop for SessionManager<A> {
    fn drop(&mut self) {
        self.inner.abort_background();
    }
}

impl<A: UserApi + 'static> SessionInner<A> {
    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn invalidate(&self) {
        self.abort_background();
        if let Err(e) = self.profiles.store().clear() {
            error!(error = %e, "Failed to clear stored session");
        }
        self.publish(SessionState::Unauthenticated);
    }

    fn abort_background(&self) {
        let handle = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Load the signed-in profile in the background, replacing the loading
    /// placeholder when done.
    fn spawn_profile_load(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let profiles = self.profiles.clone();

        let task = tokio::spawn(async move {
            let result = load_signed_in_user(&profiles).await;
            let Some(inner) = weak.upgrade() else {
                debug!("Session dropped before profile load finished");
                return;
            };
            if !inner.state.borrow().is_authenticated() {
                return;
            }
            match result {
                Ok(view) => {
                    info!(user_id = %view.id, "Profile loaded after OAuth login");
                    inner.publish(SessionState::Authenticated(view));
                }
                Err(e) => {
                    warn!(error = %e, "OAuth token was rejected");
                    inner.invalidate();
                }
            }
        });

        let previous = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Work out who "me" is and run the pipeline for them.
///
/// Only an auth rejection from the backend is an error; everything else
/// degrades to a placeholder.
async fn load_signed_in_user<A: UserApi>(
    profiles: &ProfileService<A>,
) -> std::result::Result<ProfileView, ApiError> {
    if let Some(me) = profiles.current_identity() {
        return Ok(profiles.fetch_current_user(&me).await);
    }

    match profiles.api().current_user().await {
        Ok(Some(record)) => Ok(profiles.adopt_current_user(&record)),
        Ok(None) => Ok(unknown_user()),
        Err(e) if e.is_auth() => Err(e),
        Err(e) => {
            warn!(error = %e, "Could not determine current user");
            Ok(unknown_user())
        }
    }
}
