//! SkillNet CLI - Drive the identity client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in with email and password (or set SKILLNET_PASSWORD)
//! skillnet login -e alex@example.com -p secret
//!
//! # Show the restored session
//! skillnet whoami
//!
//! # Look up a profile by id, username, email or display name
//! skillnet profile "Alex Johnson"
//!
//! # Edit your own profile
//! skillnet update-profile --bio "Learning Rust"
//!
//! # Toggle following a user and wait for the backend to settle
//! skillnet follow 681e3c071b66872f18bcae12 --settle
//!
//! # OAuth: print the provider URL, then hand back the redirect
//! skillnet oauth-url github
//! skillnet oauth-callback "http://localhost:5173/oauth2/redirect?token=...&userId=..."
//! ```
//!
//! # Environment Variables
//!
//! - `SKILLNET_STORE_PATH` - Identity file (default `.skillnet/identity.json`)
//! - `SKILLNET_API_BASE_URL`, `SKILLNET_OAUTH_BASE_URL`, `SKILLNET_OAUTH_REDIRECT_URI`
//! - `SKILLNET_REQUEST_TIMEOUT_SECS`, `SKILLNET_FOLLOW_SETTLE_MS`
//! - `RUST_LOG` - Log filter (default `info`), logs go to stderr

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Context;

const DEFAULT_STORE_PATH: &str = ".skillnet/identity.json";

#[derive(Parser)]
#[command(name = "skillnet")]
#[command(author, version, about = "SkillNet identity and profile client")]
struct Cli {
    /// Identity file holding the token and profile snapshot
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        /// Password (falls back to `SKILLNET_PASSWORD`)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Restore the stored session and print it
    Whoami,
    /// Ask the backend whether the stored token is still valid
    Revalidate,
    /// Print a profile
    Profile {
        /// Id, username, email or display name (default: yourself)
        identifier: Option<String>,
    },
    /// Edit a profile; the local snapshot is updated even when offline
    UpdateProfile {
        /// Profile to edit (default: yourself)
        #[arg(long)]
        user: Option<String>,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        bio: Option<String>,

        /// New profile picture URL
        #[arg(long)]
        picture: Option<String>,
    },
    /// List users with your follow status
    Users,
    /// Follow a user, or unfollow if already following
    Follow {
        target: String,

        /// Wait for the backend to settle and print the reconciled state
        #[arg(long)]
        settle: bool,
    },
    /// Print the authorization URL for an OAuth provider
    OauthUrl {
        /// `google` or `github`
        provider: String,
    },
    /// Complete an OAuth login from the redirect URL or its query string
    OauthCallback { redirect: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let store_path = cli
        .store
        .or_else(|| std::env::var_os("SKILLNET_STORE_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
    let ctx = Context::open(&store_path)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::session::login(&ctx, &email, password).await?;
        }
        Commands::Logout => commands::session::logout(&ctx)?,
        Commands::Whoami => commands::session::whoami(&ctx).await?,
        Commands::Revalidate => commands::session::revalidate(&ctx).await?,
        Commands::Profile { identifier } => {
            commands::profile::show(&ctx, identifier.as_deref()).await?;
        }
        Commands::UpdateProfile {
            user,
            name,
            bio,
            picture,
        } => {
            let update = skillnet_core::ProfileUpdate {
                full_name: name,
                bio,
                profile_picture_url: picture,
            };
            commands::profile::update(&ctx, user.as_deref(), update).await?;
        }
        Commands::Users => commands::profile::users(&ctx).await?,
        Commands::Follow { target, settle } => {
            commands::follow::toggle(&ctx, &target, settle).await?;
        }
        Commands::OauthUrl { provider } => commands::session::oauth_url(&ctx, &provider)?,
        Commands::OauthCallback { redirect } => {
            commands::session::oauth_callback(&ctx, &redirect).await?;
        }
    }
    Ok(())
}
