//! Persistent key/value store shared by every context.
//!
//! The store is the single source of truth: anything a context keeps in
//! memory is a cache rebuilt from here. Operations are atomic per key with
//! no cross-key transactions.

mod config;
pub mod counter;
pub mod memory;
pub mod settings;
pub mod sqlite;

pub use config::{
    AccrualConfig, BadgeConfig, EngineConfig, NavigationConfig, RetentionConfig, SiteConfig,
};
pub use memory::MemoryStore;
pub use settings::{InstallReason, Settings};
pub use sqlite::SqliteStore;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ConfigError, StoreError};

/// Key/value pairs as read from or written to the store.
pub type Entries = BTreeMap<String, Value>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the given keys. Absent keys are missing from the result.
    async fn get(&self, keys: &[&str]) -> Result<Entries, StoreError>;

    async fn set(&self, entries: Entries) -> Result<(), StoreError>;

    /// Remove the given keys. Removing an absent key is not an error.
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    async fn get_all(&self) -> Result<Entries, StoreError>;

    /// Add one to the integer under `key` and return the new value.
    ///
    /// The default is a load followed by a store and can lose an update when
    /// two contexts race on the same key. Backends able to do better
    /// override it with a single atomic read-modify-write.
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let entries = self.get(&[key]).await?;
        let current = entries
            .get(key)
            .map(|v| counter::count_from_value(key, v).unwrap_or(0))
            .unwrap_or(0);
        let next = current + 1;
        self.set(Entries::from([(key.to_string(), Value::from(next))]))
            .await?;
        Ok(next)
    }
}

/// Returns `~/.config/shorts-quota[-dev]/` based on SHORTS_QUOTA_ENV.
///
/// Set SHORTS_QUOTA_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SHORTS_QUOTA_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("shorts-quota-dev")
    } else {
        base_dir.join("shorts-quota")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
