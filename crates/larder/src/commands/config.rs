//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use larder_config::{ConfigError, LarderConfig, ServerConfig, SessionConfig};

use super::{Context, print_json, print_success};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./larder.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(),
        ConfigCommand::Init { local, force } => cmd_init(local, force),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;

    if ctx.json_output {
        return print_json(&serde_json::json!({
            "server_url": settings.server_url,
            "timeout_secs": settings.timeout.as_secs(),
            "token_file": settings.token_file,
            "config_files": ctx.config_files,
        }));
    }

    println!("# Larder Configuration\n");

    if ctx.config_files.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for path in &ctx.config_files {
            println!("  {}", path.display());
        }
        println!();
    }

    println!("Server:");
    println!("  url:     {}", settings.server_url);
    println!("  timeout: {}s", settings.timeout.as_secs());
    println!();
    println!("Session:");
    println!("  token file: {}", settings.token_file.display());

    Ok(())
}

fn cmd_which() -> Result<()> {
    let loaded = larder_config::load_config(None)?;

    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    for warning in &loaded.warnings {
        println!("  ⚠ {}", warning);
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'larder config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn cmd_init(local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("larder.toml")
    } else {
        larder_config::xdg_config_path().ok_or(ConfigError::NoConfigDir)?
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    larder_config::save_config(&default_config(), &path)?;
    print_success(format!("Wrote {}", path.display()));
    Ok(())
}

fn cmd_path() -> Result<()> {
    let path = larder_config::xdg_config_path().ok_or(ConfigError::NoConfigDir)?;
    println!("{}", path.display());
    Ok(())
}

fn default_config() -> LarderConfig {
    LarderConfig {
        server: Some(ServerConfig {
            url: Some(larder_config::DEFAULT_SERVER_URL.to_string()),
            timeout_secs: Some(larder_config::DEFAULT_TIMEOUT_SECS),
        }),
        session: Some(SessionConfig::default()),
    }
}
