//! Configuration management for the watch-list table viewer.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `WATCHLIST__*` environment variables.

use std::env;

use config::builder::DefaultState;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};

use crate::models::AppConfig;

fn builder_with_defaults() -> Result<config::ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = AppConfig::default();
    ConfigBuilder::builder()
        .set_default("redis.url", defaults.redis.url)?
        .set_default("redis.key_prefix", defaults.redis.key_prefix)?
        .set_default("redis.timeout_ms", defaults.redis.timeout_ms as i64)?
        .set_default("source.base_url", defaults.source.base_url)?
        .set_default("source.page_delay_ms", defaults.source.page_delay_ms as i64)?
        .set_default("active_view", defaults.active_view)
}

/// Load configuration from the config file and environment variables
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = builder_with_defaults()?
        .add_source(File::with_name(&config_file).required(false))
        .add_source(Environment::with_prefix("WATCHLIST").separator("__"))
        .build()?;

    config.try_deserialize()
}
