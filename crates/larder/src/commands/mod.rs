//! CLI command handlers.

use std::path::PathBuf;

use anyhow::Result;
use console::Style;
use serde::Serialize;

use larder_client::LarderClient;
use larder_config::ClientSettings;

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod recipes;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Session-aware API client.
    pub client: LarderClient,
    /// Effective settings the client was built from.
    pub settings: ClientSettings,
    /// Config files that contributed to `settings`.
    pub config_files: Vec<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a green check mark followed by `message`.
pub fn print_success(message: impl std::fmt::Display) {
    let green = Style::new().green();
    println!("{} {}", green.apply_to("✓"), message);
}

/// Shorten `s` to at most `max_len` characters on one line.
pub fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_len {
        s
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
