use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::TableConfig;

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Prefix put in front of every preference key
    pub key_prefix: String,
    /// Connect and command timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_timeout_ms() -> u64 {
    500
}

/// List API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the REST API
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,
    /// Pause between two page requests in milliseconds
    pub page_delay_ms: u64,
    /// Upper bound on pages fetched per view
    #[serde(default)]
    pub max_pages: Option<usize>,
}

/// One list view: where its records come from and how its table behaves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Endpoint path relative to the API base URL
    pub endpoint: String,
    /// Table definition
    pub table: TableConfig,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Redis configuration
    pub redis: RedisConfig,
    /// List API configuration
    pub source: SourceConfig,
    /// View rendered by the binary
    pub active_view: String,
    /// Search applied before rendering
    #[serde(default)]
    pub search: Option<String>,
    /// Declared views by name
    #[serde(default)]
    pub views: HashMap<String, ViewConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                key_prefix: "watchlist:prefs".to_string(),
                timeout_ms: default_redis_timeout_ms(),
            },
            source: SourceConfig {
                base_url: "http://127.0.0.1:8000/api".to_string(),
                api_token: None,
                page_delay_ms: 500,
                max_pages: None,
            },
            active_view: "alerts".to_string(),
            search: None,
            views: HashMap::new(),
        }
    }
}
