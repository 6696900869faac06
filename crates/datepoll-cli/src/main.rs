//! datepoll - command-line front end for the poll scheduling service.
//!
//! Every invocation resumes the persisted session, runs one command through
//! the session-aware API client, and reports when the session has ended.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use datepoll_core::config::Config;
use datepoll_core::{AppContext, HistoryNavigator};

#[derive(Debug, Parser)]
#[command(name = "datepoll", version, about = "Sign in and manage polls from the terminal")]
struct Cli {
    /// Backend address, overriding the config file
    #[arg(long, global = true, env = "DATEPOLL_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        /// Account email (defaults to the last one used)
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Renew the access token now
    Refresh,
    /// Update name and email
    Profile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Change the account password
    Password,
    /// Third-party sign-in
    #[command(subcommand)]
    Oauth(OauthCommand),
    /// Browse and manage polls
    #[command(subcommand)]
    Polls(PollsCommand),
    /// Check whether a page may be opened in the current session
    Visit { path: String },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum OauthCommand {
    /// Print the address that starts sign-in in a browser
    Url,
    /// Finish sign-in with the token handed to the callback page
    Complete { token: String },
}

#[derive(Debug, Subcommand)]
enum PollsCommand {
    /// List public polls
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one poll as JSON
    Show { id: String },
    /// List polls created by the signed-in user
    Mine,
    /// Create a poll from a JSON document
    Create { json: String },
    /// Delete a poll
    Delete { id: String },
    /// Submit a vote from a JSON document
    Vote { id: String, json: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=datepoll_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load_with_env()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    debug!(api = %config.api_base_url, backend = ?config.credential_backend, "Configuration loaded");

    let navigator = Arc::new(HistoryNavigator::new());
    let ctx = AppContext::from_config(&config, navigator.clone())?;

    if let Some(check) = ctx.auth.hydrate_from_store() {
        if let Err(e) = check.await {
            debug!(error = %e, "Session check task failed");
        }
    }

    let result = commands::run(&ctx, &mut config, cli.command).await;

    if navigator.at_login() {
        eprintln!("Your session has ended. Run `datepoll login` to sign in again.");
    }
    result
}
