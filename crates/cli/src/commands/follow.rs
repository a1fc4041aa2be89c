//! Follow command.

use std::time::Duration;

use skillnet_client::FollowSynchronizer;
use skillnet_core::Identifier;
use tracing::info;

use super::{CliError, Context, print_json};

/// Extra wait past the settle delay so reconciliation can finish.
const SETTLE_MARGIN: Duration = Duration::from_millis(250);

/// Toggle following `target`.
///
/// The current relationship is read from the backend first, so the toggle
/// goes in the right direction.
pub async fn toggle(ctx: &Context, target: &str, settle: bool) -> Result<(), CliError> {
    let target = Identifier::parse(target)?;
    let viewer = ctx.profiles.current_identity().ok_or(CliError::NotSignedIn)?;

    let follows = FollowSynchronizer::new(ctx.profiles.clone(), &ctx.config);
    if let Some(view) = ctx
        .profiles
        .fetch_profile_with_status(&target, viewer.as_str())
        .await
    {
        follows.observe(&target, &view);
    }

    let state = follows.toggle_follow(&target).await?;
    info!(
        following = state.is_following,
        followers = state.followers,
        "Follow state changed"
    );

    if settle {
        tokio::time::sleep(ctx.config.follow_settle_delay + SETTLE_MARGIN).await;
    }
    print_json(&follows.state(&target).unwrap_or(state))
}
