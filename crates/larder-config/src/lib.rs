//! Configuration system for the Larder client.
//!
//! Provides TOML-based configuration with:
//! - Server connection settings (`[server]`)
//! - Session persistence settings (`[session]`)
//! - Config file layering (user config dir + project-local overrides)
//! - Environment overrides (`LARDER_SERVER_URL`, `LARDER_TOKEN_FILE`)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, save_config, xdg_config_dir,
    xdg_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;
