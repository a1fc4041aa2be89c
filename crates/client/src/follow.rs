//! Optimistic follow/unfollow with rollback and delayed reconciliation.
//!
//! A toggle flips the local [`FollowState`] before the backend answers. On
//! failure the exact previous state is restored. On success a reconciliation
//! task waits for the settle delay, then overwrites the local state with what
//! the backend reports. At most one toggle per target is in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use skillnet_core::{Identifier, ProfileView};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::UserApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::profile::ProfileService;
use crate::resolver::resolve_api_identifier;

/// Follow relationship between the signed-in user and one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowState {
    pub is_following: bool,
    pub followers: u64,
}

impl FollowState {
    /// The state after flipping the relationship.
    #[must_use]
    pub const fn toggled(self) -> Self {
        if self.is_following {
            Self {
                is_following: false,
                followers: self.followers.saturating_sub(1),
            }
        } else {
            Self {
                is_following: true,
                followers: self.followers.saturating_add(1),
            }
        }
    }
}

impl From<&ProfileView> for FollowState {
    fn from(view: &ProfileView) -> Self {
        Self {
            is_following: view.is_following,
            followers: view.followers,
        }
    }
}

/// Per-target follow state shared with reconciliation tasks.
///
/// Dropping the synchronizer aborts pending reconciliations.
pub struct FollowSynchronizer<A: UserApi + 'static> {
    inner: Arc<FollowInner<A>>,
}

struct FollowInner<A> {
    profiles: ProfileService<A>,
    settle_delay: Duration,
    states: Mutex<HashMap<String, FollowState>>,
    in_flight: Mutex<HashSet<String>>,
    reconcilers: Mutex<HashMap<String, AbortHandle>>,
}

/// Marks a target as in flight until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: UserApi + 'static> std::fmt::Debug for FollowSynchronizer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowSynchronizer")
            .field("settle_delay", &self.inner.settle_delay)
            .field("targets", &lock(&self.inner.states).len())
            .finish_non_exhaustive()
    }
}

impl<A: UserApi + 'static> FollowSynchronizer<A> {
    #[must_use]
    pub fn new(profiles: ProfileService<A>, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(FollowInner {
                profiles,
                settle_delay: config.follow_settle_delay,
                states: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                reconcilers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Seed the state for `target` from a fetched profile.
    ///
    /// Ignored while a toggle for `target` is in flight.
    pub fn observe(&self, target: &Identifier, view: &ProfileView) {
        if self.is_in_flight(target) {
            debug!(target_id = %target, "Toggle in flight; ignoring observed state");
            return;
        }
        self.inner.set_state(target.as_str(), Some(FollowState::from(view)));
    }

    /// Last known state for `target`.
    #[must_use]
    pub fn state(&self, target: &Identifier) -> Option<FollowState> {
        lock(&self.inner.states).get(target.as_str()).copied()
    }

    #[must_use]
    pub fn is_in_flight(&self, target: &Identifier) -> bool {
        lock(&self.inner.in_flight).contains(target.as_str())
    }

    /// Follow `target` if not following, unfollow otherwise.
    ///
    /// Reconciliation is spawned on the current Tokio runtime after a
    /// successful toggle.
    ///
    /// # Errors
    ///
    /// - `ClientError::ConcurrentMutation` if a toggle for `target` is already
    ///   running; nothing is changed.
    /// - `ClientError::Auth` if there is no token or no signed-in user id;
    ///   nothing is changed.
    /// - `ClientError::Api` if the backend call failed; the previous state is
    ///   restored.
    #[instrument(skip_all, fields(target_id = %target))]
    pub async fn toggle_follow(&self, target: &Identifier) -> Result<FollowState> {
        let key = target.as_str().to_owned();
        let _in_flight = self.claim(&key)?;

        let profiles = &self.inner.profiles;
        if !profiles.store().has_token() {
            return Err(ClientError::Auth(
                "No authentication token found. Cannot change follow state.".to_string(),
            ));
        }
        let Some(viewer) = profiles.current_identity() else {
            return Err(ClientError::Auth("No signed-in user id".to_string()));
        };

        // A pending reconciliation would overwrite the optimistic state.
        self.inner.cancel_reconciliation(&key);

        let snapshot = self.state(target);
        let before = snapshot.unwrap_or_default();
        let optimistic = before.toggled();
        self.inner.set_state(&key, Some(optimistic));

        let cached = profiles.store().cached_profile_lossy();
        let target_id = resolve_api_identifier(target, cached.as_ref());
        let result = if before.is_following {
            profiles.api().unfollow(viewer.as_str(), &target_id).await
        } else {
            profiles.api().follow(viewer.as_str(), &target_id).await
        };

        match result {
            Ok(()) => {
                info!(
                    following = optimistic.is_following,
                    followers = optimistic.followers,
                    "Follow state changed"
                );
                self.schedule_reconciliation(key, target.clone(), viewer);
                Ok(optimistic)
            }
            Err(e) => {
                warn!(error = %e, "Follow change failed; restoring previous state");
                self.inner.set_state(&key, snapshot);
                Err(e.into())
            }
        }
    }

    /// Abort every pending reconciliation.
    pub fn shutdown(&self) {
        let handles: Vec<_> = lock(&self.inner.reconcilers).drain().collect();
        debug!(count = handles.len(), "Cancelling follow reconciliations");
        for (_, handle) in handles {
            handle.abort();
        }
    }

    fn claim(&self, key: &str) -> Result<InFlight<'_>> {
        let mut set = lock(&self.inner.in_flight);
        if !set.insert(key.to_owned()) {
            debug!(target_id = %key, "Toggle already in flight");
            return Err(ClientError::ConcurrentMutation(key.to_owned()));
        }
        Ok(InFlight {
            set: &self.inner.in_flight,
            key: key.to_owned(),
        })
    }

    fn schedule_reconciliation(&self, key: String, target: Identifier, viewer: Identifier) {
        let weak: Weak<FollowInner<A>> = Arc::downgrade(&self.inner);
        let delay = self.inner.settle_delay;
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Some(view) = inner
                .profiles
                .fetch_profile_with_status(&target, viewer.as_str())
                .await
            else {
                debug!(target_id = %task_key, "Reconciliation fetch returned nothing");
                return;
            };
            if lock(&inner.in_flight).contains(&task_key) {
                return;
            }
            debug!(
                target_id = %task_key,
                following = view.is_following,
                followers = view.followers,
                "Follow state reconciled"
            );
            inner.set_state(&task_key, Some(FollowState::from(&view)));
        });

        if let Some(previous) = lock(&self.inner.reconcilers).insert(key, task.abort_handle()) {
            previous.abort();
        }
    }
}

impl<A: UserApi + 'static> Drop for FollowSynchronizer<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<A> FollowInner<A> {
    fn set_state(&self, key: &str, state: Option<FollowState>) {
        let mut states = lock(&self.states);
        match state {
            Some(state) => {
                states.insert(key.to_owned(), state);
            }
            None => {
                states.remove(key);
            }
        }
    }

    fn cancel_reconciliation(&self, key: &str) {
        if let Some(handle) = lock(&self.reconcilers).remove(key) {
            handle.abort();
        }
    }
}
