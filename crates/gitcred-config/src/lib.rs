//! Configuration system for gitcred.
//!
//! Provides TOML-based configuration with:
//! - Helper behaviour (`[credential]`): provider override, store, timeouts
//! - Generic OAuth settings (`[oauth]`) with per-remote overrides
//! - Per-provider client registration overrides (`[provider.<id>]`)
//! - Config file layering (user config dir + explicit `--config` file)
//! - Environment variable overrides with provenance tracking

pub mod discovery;
pub mod env;
pub mod error;
pub mod settings;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir,
};
pub use env::EnvVars;
pub use error::{ConfigError, Result};
pub use settings::{ClientOverrides, Resolved, SettingSource, Settings, StoreKind, parse_bool};
pub use types::*;
