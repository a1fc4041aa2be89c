//! Profile commands.

use skillnet_core::ProfileUpdate;
use tracing::{info, warn};

use super::{CliError, Context, print_json};

pub async fn show(ctx: &Context, identifier: Option<&str>) -> Result<(), CliError> {
    let identifier = ctx.identifier_or_me(identifier)?;
    let view = ctx.profiles.fetch_profile(&identifier).await;
    print_json(&view)
}

/// Apply `update` and report whether it reached the backend.
pub async fn update(
    ctx: &Context,
    user: Option<&str>,
    update: ProfileUpdate,
) -> Result<(), CliError> {
    let identifier = ctx.identifier_or_me(user)?;
    if update.clone().normalized().is_empty() {
        warn!("Nothing to update; pass --name, --bio or --picture");
    }

    let outcome = ctx.profiles.update_profile(&identifier, update).await?;
    match outcome.durability.notice() {
        Some(notice) => warn!("{notice}"),
        None => info!("Profile updated"),
    }
    print_json(&outcome.view)
}

pub async fn users(ctx: &Context) -> Result<(), CliError> {
    let users = ctx.profiles.list_users().await;
    info!(count = users.len(), "Users listed");
    print_json(&users)
}
