//! Larder - command-line client for the Larder recipe service
//!
//! Main entry point for the Larder CLI.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::Style;
use tokio::sync::broadcast;

use larder_client::{FileTokenStore, LarderClient, SessionEvent};
use larder_config::ConfigError;

mod commands;

use commands::{auth, config, dashboard, recipes};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Larder - browse, save and cook recipes from the terminal
#[derive(Parser)]
#[command(name = "larder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: http://localhost:8080/api)
    #[arg(long, global = true, env = "LARDER_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in, register and manage your session
    Auth(auth::AuthArgs),

    /// Browse and manage recipes
    Recipes(recipes::RecipesArgs),

    /// Show your dashboard
    Dashboard(dashboard::DashboardArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = larder_config::xdg_config_dir().ok_or(ConfigError::NoConfigDir)?;

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "larder=debug,larder_client=debug,larder_config=debug,info"
    } else {
        "larder=info,larder_client=warn,larder_config=warn,warn"
    };

    let file_appender = tracing_appender::rolling::daily(config_dir.join("logs"), "larder.log");
    let (non_blocking, log_guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "larder=trace,larder_client=trace,larder_config=trace,info",
                )),
        )
        .init();

    let loaded = larder_config::load_config(None)?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let mut settings = loaded
        .config
        .resolve(&config_dir)
        .context("Invalid configuration")?;
    if let Some(server) = cli.server {
        settings.server_url = server;
    }
    tracing::debug!(server = %settings.server_url, token_file = %settings.token_file.display(), "resolved settings");

    let store = Arc::new(FileTokenStore::open(settings.token_file.clone()));
    let client = LarderClient::builder()
        .base_url(settings.server_url.clone())
        .timeout(settings.timeout)
        .token_store(store)
        .build()?;

    let listener = tokio::spawn(watch_session(client.subscribe()));

    let ctx = commands::Context {
        client,
        settings,
        config_files: loaded.loaded_from().iter().map(|p| p.to_path_buf()).collect(),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Recipes(args) => recipes::run(args, &ctx).await,
        Commands::Dashboard(args) => dashboard::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    };

    // Dropping the last client handle closes the event channel, letting the
    // listener drain whatever the command triggered before we exit.
    drop(ctx);
    let _ = listener.await;

    if let Err(e) = result {
        drop(log_guard);
        let red = Style::new().red();
        eprintln!("{} {:#}", red.apply_to("Error:"), e);
        std::process::exit(1);
    }

    Ok(())
}

/// React to session changes reported by the client.
async fn watch_session(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Expired { reason }) => {
                let yellow = Style::new().yellow();
                eprintln!(
                    "{} Your session has ended ({}). Run 'larder auth login' to sign in again.",
                    yellow.apply_to("!"),
                    reason
                );
            }
            Ok(event) => tracing::debug!(?event, "session event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "session listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
