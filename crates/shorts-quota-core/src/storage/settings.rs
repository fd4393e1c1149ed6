//! User quota settings as persisted in the shared store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{Entries, Store};
use crate::error::{StoreError, ValidationError};

pub const MAX_SHORTS_KEY: &str = "maxShorts";
pub const ENABLED_KEY: &str = "enabled";
pub const BADGE_ENABLED_KEY: &str = "badgeEnabled";

pub const SETTINGS_KEYS: [&str; 3] = [MAX_SHORTS_KEY, ENABLED_KEY, BADGE_ENABLED_KEY];

pub const DEFAULT_MAX_SHORTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub max_shorts: u32,
    pub enabled: bool,
    pub badge_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_shorts: DEFAULT_MAX_SHORTS,
            enabled: true,
            badge_enabled: true,
        }
    }
}

/// Why the install/update hook fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallReason {
    Install,
    Update,
}

/// A positive limit, or `None` for anything else.
pub fn max_shorts_from_value(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(n).ok().filter(|n| *n > 0)
}

impl Settings {
    /// Build settings from whatever subset of keys is present.
    ///
    /// Missing or malformed values fall back to their defaults. `enabled`
    /// is only off when explicitly stored as `false`.
    pub fn from_entries(entries: &Entries) -> Self {
        let defaults = Self::default();
        Self {
            max_shorts: entries
                .get(MAX_SHORTS_KEY)
                .and_then(max_shorts_from_value)
                .unwrap_or(defaults.max_shorts),
            enabled: entries
                .get(ENABLED_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.enabled),
            badge_enabled: entries
                .get(BADGE_ENABLED_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.badge_enabled),
        }
    }

    pub fn to_entries(&self) -> Entries {
        Entries::from([
            (MAX_SHORTS_KEY.to_string(), Value::from(self.max_shorts)),
            (ENABLED_KEY.to_string(), Value::Bool(self.enabled)),
            (BADGE_ENABLED_KEY.to_string(), Value::Bool(self.badge_enabled)),
        ])
    }

    /// Read settings from the store.
    ///
    /// # Errors
    /// Returns the store error; use [`Settings::load_or_default`] where a
    /// default is acceptable.
    pub async fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let entries = store.get(&SETTINGS_KEYS).await?;
        Ok(Self::from_entries(&entries))
    }

    pub async fn load_or_default(store: &dyn Store) -> Self {
        match Self::load(store).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "settings unavailable, using defaults");
                Self::default()
            }
        }
    }

    pub async fn save(&self, store: &dyn Store) -> Result<(), StoreError> {
        store.set(self.to_entries()).await
    }

    pub fn validate_max_shorts(value: i64) -> Result<u32, ValidationError> {
        u32::try_from(value)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: MAX_SHORTS_KEY.into(),
                message: format!("must be a positive integer, got {value}"),
            })
    }

    /// Install/update hook.
    ///
    /// A fresh install writes the full default triple. An update only fills
    /// in keys that are absent, leaving every stored user value alone.
    pub async fn on_installed(store: &dyn Store, reason: InstallReason) -> Result<(), StoreError> {
        let defaults = Self::default().to_entries();
        match reason {
            InstallReason::Install => {
                store.set(defaults).await?;
                info!("default settings written");
            }
            InstallReason::Update => {
                let present = store.get(&SETTINGS_KEYS).await?;
                let missing: Entries = defaults
                    .into_iter()
                    .filter(|(k, _)| !present.contains_key(k))
                    .collect();
                if !missing.is_empty() {
                    info!(keys = ?missing.keys().collect::<Vec<_>>(), "back-filling settings");
                    store.set(missing).await?;
                }
            }
        }
        Ok(())
    }
}
