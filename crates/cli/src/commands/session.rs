//! Session commands: login, logout, whoami, revalidate and the OAuth flow.

use std::time::Duration;

use secrecy::SecretString;
use skillnet_core::OAuthProvider;
use tracing::{info, warn};

use super::{CliError, Context, print_json};

/// How long `oauth-callback` waits for the background profile load.
const PROFILE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn login(ctx: &Context, email: &str, password: Option<String>) -> Result<(), CliError> {
    let password = password
        .or_else(|| std::env::var("SKILLNET_PASSWORD").ok())
        .map(SecretString::from)
        .ok_or(CliError::MissingPassword)?;

    let session = ctx.session();
    let outcome = session.login_with_credentials(email, &password).await;
    if !outcome.success {
        return Err(CliError::LoginFailed(outcome.message.unwrap_or_default()));
    }

    info!("Login successful");
    print_json(&session.state())
}

pub fn logout(ctx: &Context) -> Result<(), CliError> {
    ctx.session().logout()?;
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<(), CliError> {
    let session = ctx.session();
    print_json(&session.initialize().await)
}

pub async fn revalidate(ctx: &Context) -> Result<(), CliError> {
    let session = ctx.session();
    let state = session.revalidate().await;
    if !state.is_authenticated() {
        warn!("No valid session");
    }
    print_json(&state)
}

#[allow(clippy::print_stdout)]
pub fn oauth_url(ctx: &Context, provider: &str) -> Result<(), CliError> {
    let provider: OAuthProvider = provider
        .parse()
        .map_err(|_| CliError::UnknownProvider(provider.to_owned()))?;
    let url = ctx.session().authorization_url(provider)?;
    println!("{url}");
    Ok(())
}

/// Store the token from an OAuth redirect and print the loaded profile.
pub async fn oauth_callback(ctx: &Context, redirect: &str) -> Result<(), CliError> {
    let session = ctx.session();
    let loading = session.handle_oauth_callback(redirect)?;
    let mut updates = session.subscribe();

    info!("Token stored; loading profile");
    let loaded = tokio::time::timeout(PROFILE_LOAD_TIMEOUT, updates.wait_for(|s| *s != loading))
        .await
        .ok()
        .and_then(Result::ok)
        .map(|state| state.clone());

    let state = loaded.unwrap_or_else(|| {
        warn!("Profile did not load in time; showing placeholder");
        loading.clone()
    });
    print_json(&state)
}
