//! TOML-based engine configuration.
//!
//! Holds host-side tuning that the user never edits from the control panel:
//! - Dwell threshold and poll cadence for accrual
//! - Navigation settle delay
//! - Retention horizon and sweep period
//! - Target site pattern and safe landing page
//! - Badge display ceiling
//!
//! Configuration is stored at `~/.config/shorts-quota/config.toml`.
//! Quota settings (limit, enabled, badge) live in the [`Store`](super::Store).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::pattern::UrlPattern;

/// Accrual timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Dwell that must be strictly exceeded before a view counts.
    #[serde(default = "default_dwell_threshold_ms")]
    pub dwell_threshold_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Wait after a detected URL change before classifying the page.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_sweep_period_min")]
    pub sweep_period_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Match pattern selecting the tabs that receive broadcasts.
    #[serde(default = "default_tab_pattern")]
    pub tab_pattern: String,
    /// Where "navigate to safe page" on the overlay leads.
    #[serde(default = "default_safe_url")]
    pub safe_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeConfig {
    #[serde(default = "default_max_display")]
    pub max_display: u32,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/shorts-quota/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub accrual: AccrualConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub badge: BadgeConfig,
}

fn default_dwell_threshold_ms() -> u64 {
    5_000
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_settle_delay_ms() -> u64 {
    1_000
}
fn default_horizon_days() -> u32 {
    7
}
fn default_sweep_period_min() -> u32 {
    60
}
fn default_tab_pattern() -> String {
    "*://*.youtube.com/*".into()
}
fn default_safe_url() -> String {
    "https://www.youtube.com/".into()
}
fn default_max_display() -> u32 {
    999
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            dwell_threshold_ms: default_dwell_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            sweep_period_min: default_sweep_period_min(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            tab_pattern: default_tab_pattern(),
            safe_url: default_safe_url(),
        }
    }
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            max_display: default_max_display(),
        }
    }
}

impl AccrualConfig {
    pub fn dwell_threshold(&self) -> Duration {
        Duration::from_millis(self.dwell_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl NavigationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl RetentionConfig {
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.sweep_period_min) * 60)
    }
}

impl EngineConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("cannot replace a whole section".into()));
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Set a config value by key without touching disk.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |e: serde_json::Error| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        };
        let mut json = serde_json::to_value(&*self).map_err(invalid)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json).map_err(invalid)?;
        updated.validate(key)?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        let reject = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if let Err(e) = self.site.tab_pattern.parse::<UrlPattern>() {
            return Err(reject(e.to_string()));
        }
        if self.retention.sweep_period_min == 0 {
            return Err(reject("retention.sweep_period_min must be positive".into()));
        }
        if self.accrual.poll_interval_ms == 0 {
            return Err(reject("accrual.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
