//! Durable view preferences.
//!
//! Page size and saved filters live under a per-module namespace, the filter
//! panel visibility flag is shared by every view. All reads and writes are
//! best-effort: a broken store degrades to defaults and is only logged.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use redis::Commands;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::date_range::DateRangeState;
use crate::utils::format_preference_key;

pub const ITEMS_PER_PAGE_PREFIX: &str = "items_per_page";
pub const SAVED_FILTERS_PREFIX: &str = "filters";
pub const FILTER_PANEL_VISIBLE_KEY: &str = "filter_panel_visible";

/// Connect and I/O timeout used unless one is configured
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors that can occur while talking to a preference store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous string key-value store
#[cfg_attr(test, mockall::automock)]
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Redis-backed store, every key is prefixed with `key_prefix`
pub struct RedisStore {
    /// Redis client
    redis: redis::Client,
    /// Key prefix, e.g. `watchlist:prefs`
    key_prefix: String,
    /// Bound on connecting and on each command round-trip
    timeout: Duration,
}

impl RedisStore {
    /// Create a new Redis store
    pub fn new(redis: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self::with_timeout(redis, key_prefix, DEFAULT_STORE_TIMEOUT)
    }

    /// Create a new Redis store whose connections give up after `timeout`
    pub fn with_timeout(redis: redis::Client, key_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn full_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        let conn = self.redis.get_connection_with_timeout(self.timeout)?;
        conn.set_read_timeout(Some(self.timeout))?;
        conn.set_write_timeout(Some(self.timeout))?;
        Ok(conn)
    }
}

impl PreferenceStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(self.full_key(key))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.set::<_, _, ()>(self.full_key(key), value)?;
        Ok(())
    }
}

/// A named snapshot of a view's filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedFilterEntry {
    pub name: String,
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub date_range: DateRangeState,
    pub saved_at: DateTime<Utc>,
}

/// Preference accessor bound to one module namespace
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
    module_id: String,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>, module_id: impl Into<String>) -> Self {
        Self {
            store,
            module_id: module_id.into(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Stored page size, or `default` when absent, zero or unreadable
    pub fn page_size(&self, default: usize) -> usize {
        let key = format_preference_key(ITEMS_PER_PAGE_PREFIX, &self.module_id);
        self.read_json::<usize>(&key)
            .filter(|size| *size > 0)
            .unwrap_or(default)
    }

    pub fn set_page_size(&self, size: usize) {
        let key = format_preference_key(ITEMS_PER_PAGE_PREFIX, &self.module_id);
        self.write_json(&key, &size);
    }

    /// Global filter panel visibility, `false` when absent or unreadable
    pub fn filters_visible(&self) -> bool {
        self.read_json::<bool>(FILTER_PANEL_VISIBLE_KEY)
            .unwrap_or(false)
    }

    pub fn set_filters_visible(&self, visible: bool) {
        self.write_json(FILTER_PANEL_VISIBLE_KEY, &visible);
    }

    /// Saved filters for this module, empty when absent or unreadable
    pub fn saved_filters(&self) -> BTreeMap<String, SavedFilterEntry> {
        let key = format_preference_key(SAVED_FILTERS_PREFIX, &self.module_id);
        self.read_json(&key).unwrap_or_default()
    }

    pub fn set_saved_filters(&self, filters: &BTreeMap<String, SavedFilterEntry>) {
        let key = format_preference_key(SAVED_FILTERS_PREFIX, &self.module_id);
        self.write_json(&key, filters);
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                self.record_failure(key, &e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.record_failure(key, &StoreError::from(e));
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(key, &json));
        if let Err(e) = result {
            self.record_failure(key, &e);
        }
    }

    fn record_failure(&self, key: &str, error: &StoreError) {
        warn!("Preference store error for key {}: {}", key, error);
        metrics::increment_counter!("preference_store_errors_total", "module" => self.module_id.clone());
    }
}
