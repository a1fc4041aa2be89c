//! `reqwest` implementation of [`UserApi`].

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use skillnet_core::ProfileUpdate;
use tracing::{debug, instrument, warn};
use url::Url;

use super::types::LoginRequest;
use super::{ApiError, LoginResponse, ProfileRecord, UserApi};
use crate::config::ClientConfig;
use crate::store::IdentityStore;

/// Header the backend uses to answer with 401 instead of an OAuth redirect.
const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// HTTP client for the SkillNet API.
///
/// The bearer token is read from the [`IdentityStore`] on every request, so a
/// login or logout elsewhere takes effect immediately.
#[derive(Clone)]
pub struct HttpUserApi {
    inner: Arc<HttpUserApiInner>,
}

struct HttpUserApiInner {
    client: reqwest::Client,
    base_url: Url,
    store: IdentityStore,
}

impl std::fmt::Debug for HttpUserApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUserApi")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpUserApi {
    /// Create a client using `config`'s base URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Request` if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig, store: IdentityStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpUserApiInner {
                client,
                base_url: config.api_base_url.clone(),
                store,
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build `base/segments...`, encoding each segment exactly once.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        build_url(&self.inner.base_url, segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, url)
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1);

        match self.inner.store.token() {
            Ok(Some(token)) => builder.bearer_auth(token.expose_secret()),
            Ok(None) => builder,
            Err(e) => {
                warn!(error = %e, "Failed to read token; sending request unauthenticated");
                builder
            }
        }
    }

    /// Send and map any non-2xx status into an [`ApiError`].
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status.as_u16(), &body);
        debug!(status = status.as_u16(), error = %err, "API request failed");
        Err(err)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        let response = self.send(self.request(Method::GET, url)).await?;
        read_json(response).await
    }

    async fn fetch_record(&self, url: Url) -> Result<ProfileRecord, ApiError> {
        let record: Option<ProfileRecord> = self.get_json(url).await?;
        match record {
            Some(record) if !record.is_blank() => Ok(record),
            _ => Err(ApiError::Decode(
                "profile response did not identify a user".to_string(),
            )),
        }
    }

    async fn follow_action(
        &self,
        action: &str,
        follower: &str,
        target: &str,
    ) -> Result<(), ApiError> {
        let mut url = self.url(&["users", follower, action])?;
        url.query_pairs_mut().append_pair("targetUserId", target);
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }
}

impl UserApi for HttpUserApi {
    #[instrument(skip(self))]
    async fn get_profile(&self, id: &str) -> Result<ProfileRecord, ApiError> {
        match self.fetch_record(self.url(&["users", id, "profile"])?).await {
            Err(e) if e.is_not_found() => {
                debug!("Profile endpoint returned 404, trying user endpoint");
                self.fetch_record(self.url(&["users", id])?).await
            }
            other => other,
        }
    }

    #[instrument(skip(self, update))]
    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, ApiError> {
        let url = self.url(&["users", id, "profile"])?;
        let response = self.send(self.request(Method::PUT, url).json(update)).await?;
        let record: Option<ProfileRecord> = read_json(response).await?;
        record
            .filter(|r| !r.is_blank())
            .ok_or_else(|| ApiError::Decode("update response was empty".to_string()))
    }

    #[instrument(skip(self))]
    async fn list_users(&self, viewer: Option<&str>) -> Result<Vec<ProfileRecord>, ApiError> {
        let mut url = self.url(&["users"])?;
        if let Some(viewer) = viewer.filter(|v| !v.is_empty()) {
            url.query_pairs_mut().append_pair("currentUserId", viewer);
        }
        let users: Option<Vec<ProfileRecord>> = self.get_json(url).await?;
        let users = users.unwrap_or_default();
        debug!(count = users.len(), "Fetched users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn profile_with_status(&self, id: &str, viewer: &str) -> Result<ProfileRecord, ApiError> {
        let mut url = self.url(&["users", id, "profile-with-status"])?;
        url.query_pairs_mut().append_pair("currentUserId", viewer);
        self.fetch_record(url).await
    }

    #[instrument(skip(self))]
    async fn follow(&self, follower: &str, target: &str) -> Result<(), ApiError> {
        self.follow_action("follow", follower, target).await
    }

    #[instrument(skip(self))]
    async fn unfollow(&self, follower: &str, target: &str) -> Result<(), ApiError> {
        self.follow_action("unfollow", follower, target).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        let url = self.url(&["auth", "login"])?;
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        let response = self.send(self.request(Method::POST, url).json(&body)).await?;
        let login: Option<LoginResponse> = read_json(response).await?;
        login.ok_or_else(|| ApiError::Decode("login response was empty".to_string()))
    }

    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<ProfileRecord>, ApiError> {
        let record: Option<ProfileRecord> = self.get_json(self.url(&["oauth2", "user"])?).await?;
        Ok(record.filter(|r| !r.is_blank()))
    }
}

/// Decode a JSON body; an empty body is `None`.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn build_url(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ApiError::Request(format!("{base} cannot be a base URL")))?;
        path.pop_if_empty();
        for segment in segments {
            // Callers may hand in already-encoded ids; decode first so the
            // segment ends up encoded once.
            let decoded = urlencoding::decode(segment.trim())
                .map_or_else(|_| (*segment).to_string(), std::borrow::Cow::into_owned);
            path.push(&decoded);
        }
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:8080/api/").unwrap()
    }

    #[test]
    fn test_build_url_keeps_base_path() {
        let url = build_url(&base(), &["users", "abc", "profile"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/users/abc/profile");
    }

    #[test]
    fn test_build_url_encodes_names_once() {
        let url = build_url(&base(), &["users", "Alex Johnson", "profile"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/users/Alex%20Johnson/profile");

        let url = build_url(&base(), &["users", "Alex%20Johnson", "profile"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/users/Alex%20Johnson/profile");
    }

    #[test]
    fn test_build_url_encodes_slashes_in_ids() {
        let url = build_url(&base(), &["users", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/users/a%2Fb");
    }

    #[test]
    fn test_new_uses_config_base() {
        let config = ClientConfig::with_api_base_url("http://127.0.0.1:1/api").unwrap();
        let api = HttpUserApi::new(&config, IdentityStore::in_memory()).unwrap();
        assert_eq!(api.base_url().as_str(), "http://127.0.0.1:1/api/");
    }
}
