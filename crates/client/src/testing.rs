//! Scripted in-process [`UserApi`] for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use skillnet_core::ProfileUpdate;

use crate::api::{ApiError, LoginResponse, ProfileRecord, UserApi};

/// A record for `id` as the profile endpoint sends it (`userId` + `fullName`).
pub fn record(id: &str, name: &str) -> ProfileRecord {
    ProfileRecord {
        user_id: Some(id.to_string()),
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        ..ProfileRecord::default()
    }
}

impl ProfileRecord {
    pub fn bio(mut self, bio: &str) -> Self {
        self.bio = Some(bio.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn followers(mut self, count: u64) -> Self {
        self.follower_count = Some(count);
        self
    }

    pub fn following_count(mut self, count: u64) -> Self {
        self.following_count = Some(count);
        self
    }

    pub fn is_following(mut self, following: bool) -> Self {
        self.is_following = Some(following);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetProfile(String),
    UpdateProfile(String),
    ListUsers(Option<String>),
    ProfileWithStatus { target: String, viewer: String },
    Follow { follower: String, target: String },
    Unfollow { follower: String, target: String },
    Login { email: String, password: String },
    CurrentUser,
}

#[derive(Default)]
pub struct FakeApi {
    profiles: Mutex<HashMap<String, Result<ProfileRecord, ApiError>>>,
    profile_failure: Mutex<Option<ApiError>>,
    update: Mutex<Option<Result<ProfileRecord, ApiError>>>,
    list_results: Mutex<VecDeque<Result<Vec<ProfileRecord>, ApiError>>>,
    with_status: Mutex<HashMap<String, ProfileRecord>>,
    follow_failure: Mutex<Option<ApiError>>,
    follow_delay: Mutex<Option<Duration>>,
    login: Mutex<Option<Result<LoginResponse, ApiError>>>,
    current_user: Mutex<Option<Result<Option<ProfileRecord>, ApiError>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&self, id: &str, result: Result<ProfileRecord, ApiError>) {
        self.profiles.lock().unwrap().insert(id.to_string(), result);
    }

    /// Every profile lookup fails with `error`.
    pub fn fail_profiles_with(&self, error: ApiError) {
        *self.profile_failure.lock().unwrap() = Some(error);
    }

    pub fn set_update(&self, result: Result<ProfileRecord, ApiError>) {
        *self.update.lock().unwrap() = Some(result);
    }

    pub fn push_list_result(&self, result: Result<Vec<ProfileRecord>, ApiError>) {
        self.list_results.lock().unwrap().push_back(result);
    }

    pub fn set_profile_with_status(&self, target: &str, record: ProfileRecord) {
        self.with_status
            .lock()
            .unwrap()
            .insert(target.to_string(), record);
    }

    pub fn fail_follows_with(&self, error: ApiError) {
        *self.follow_failure.lock().unwrap() = Some(error);
    }

    pub fn delay_follows(&self, delay: Duration) {
        *self.follow_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_login(&self, result: Result<LoginResponse, ApiError>) {
        *self.login.lock().unwrap() = Some(result);
    }

    pub fn set_current_user(&self, result: Result<Option<ProfileRecord>, ApiError>) {
        *self.current_user.lock().unwrap() = Some(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn profile_lookups(&self) -> Vec<String> {
        self.collect(|call| match call {
            Call::GetProfile(id) => Some(id.clone()),
            _ => None,
        })
    }

    pub fn update_targets(&self) -> Vec<String> {
        self.collect(|call| match call {
            Call::UpdateProfile(id) => Some(id.clone()),
            _ => None,
        })
    }

    pub fn list_viewers(&self) -> Vec<Option<String>> {
        self.collect(|call| match call {
            Call::ListUsers(viewer) => Some(viewer.clone()),
            _ => None,
        })
    }

    pub fn status_lookups(&self) -> usize {
        self.collect(|call| matches!(call, Call::ProfileWithStatus { .. }).then_some(()))
            .len()
    }

    pub fn follow_mutations(&self) -> usize {
        self.collect(|call| {
            matches!(call, Call::Follow { .. } | Call::Unfollow { .. }).then_some(())
        })
        .len()
    }

    fn collect<T>(&self, f: impl Fn(&Call) -> Option<T>) -> Vec<T> {
        self.calls.lock().unwrap().iter().filter_map(f).collect()
    }

    fn record_call(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn follow_result(&self) -> Result<(), ApiError> {
        let delay = *self.follow_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.follow_failure.lock().unwrap().clone();
        failure.map_or(Ok(()), Err)
    }
}

impl UserApi for FakeApi {
    async fn get_profile(&self, id: &str) -> Result<ProfileRecord, ApiError> {
        self.record_call(Call::GetProfile(id.to_string()));
        if let Some(error) = self.profile_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.profiles
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::from_status(404, "")))
    }

    async fn update_profile(
        &self,
        id: &str,
        _update: &ProfileUpdate,
    ) -> Result<ProfileRecord, ApiError> {
        self.record_call(Call::UpdateProfile(id.to_string()));
        self.update
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::from_status(404, "")))
    }

    async fn list_users(&self, viewer: Option<&str>) -> Result<Vec<ProfileRecord>, ApiError> {
        self.record_call(Call::ListUsers(viewer.map(str::to_string)));
        self.list_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn profile_with_status(&self, id: &str, viewer: &str) -> Result<ProfileRecord, ApiError> {
        self.record_call(Call::ProfileWithStatus {
            target: id.to_string(),
            viewer: viewer.to_string(),
        });
        self.with_status
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::from_status(404, ""))
    }

    async fn follow(&self, follower: &str, target: &str) -> Result<(), ApiError> {
        self.record_call(Call::Follow {
            follower: follower.to_string(),
            target: target.to_string(),
        });
        self.follow_result().await
    }

    async fn unfollow(&self, follower: &str, target: &str) -> Result<(), ApiError> {
        self.record_call(Call::Unfollow {
            follower: follower.to_string(),
            target: target.to_string(),
        });
        self.follow_result().await
    }

    async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        self.record_call(Call::Login {
            email: email.to_string(),
            password: password.expose_secret().to_string(),
        });
        self.login
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::from_status(500, "")))
    }

    async fn current_user(&self) -> Result<Option<ProfileRecord>, ApiError> {
        self.record_call(Call::CurrentUser);
        self.current_user
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(None))
    }
}
