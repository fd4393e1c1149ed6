//! Control panel: reads the quota state and applies user changes.
//!
//! Short-lived. Writes go straight to the store; open tabs and the
//! background hear about them through messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::day_key::DayKey;
use crate::error::{CoreError, StoreError};
use crate::pattern::UrlPattern;
use crate::protocol::{broadcast, notify_background, BroadcastReport, Message, Messenger};
use crate::storage::settings::{BADGE_ENABLED_KEY, ENABLED_KEY, MAX_SHORTS_KEY};
use crate::storage::{counter, Entries, Settings, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressTone {
    Normal,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaStatus {
    Available,
    AlmostAtLimit,
    LimitReached,
}

/// Everything the panel renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub count: u64,
    pub max_shorts: u32,
    pub enabled: bool,
    pub badge_enabled: bool,
    pub progress_pct: f64,
    pub tone: ProgressTone,
    pub status: QuotaStatus,
}

impl PanelView {
    pub fn new(settings: &Settings, count: u64) -> Self {
        let max = f64::from(settings.max_shorts.max(1));
        let progress_pct = (count as f64 * 100.0 / max).min(100.0);

        let tone = if progress_pct >= 80.0 {
            ProgressTone::Danger
        } else if progress_pct >= 60.0 {
            ProgressTone::Warning
        } else {
            ProgressTone::Normal
        };

        let status = if count >= u64::from(settings.max_shorts) {
            QuotaStatus::LimitReached
        } else if count as f64 >= max * 0.8 {
            QuotaStatus::AlmostAtLimit
        } else {
            QuotaStatus::Available
        };

        Self {
            count,
            max_shorts: settings.max_shorts,
            enabled: settings.enabled,
            badge_enabled: settings.badge_enabled,
            progress_pct,
            tone,
            status,
        }
    }
}

pub struct ControlPanel {
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    tabs: UrlPattern,
    clock: Arc<dyn Clock>,
}

impl ControlPanel {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        tabs: UrlPattern,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            messenger,
            tabs,
            clock,
        }
    }

    pub async fn load(&self) -> Result<PanelView, StoreError> {
        let settings = Settings::load(self.store.as_ref()).await?;
        let count = counter::read(self.store.as_ref(), self.today()).await?;
        Ok(PanelView::new(&settings, count))
    }

    /// Validate and store a new daily limit, then refresh the badge.
    pub async fn set_max_shorts(&self, value: i64) -> Result<u32, CoreError> {
        let max = Settings::validate_max_shorts(value)?;
        self.store
            .set(Entries::from([(MAX_SHORTS_KEY.to_string(), max.into())]))
            .await?;
        info!(max_shorts = max, "daily limit updated");
        notify_background(
            self.messenger.as_ref(),
            Message::UpdateBadge {
                max_shorts: Some(max),
            },
        )
        .await;
        Ok(max)
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<BroadcastReport, StoreError> {
        self.store
            .set(Entries::from([(ENABLED_KEY.to_string(), enabled.into())]))
            .await?;
        info!(enabled, "extension toggled");
        Ok(broadcast(
            self.messenger.as_ref(),
            &self.tabs,
            &Message::ToggleExtension { enabled },
        )
        .await)
    }

    /// Flip `enabled`. Returns the new value.
    pub async fn toggle(&self) -> Result<bool, StoreError> {
        let enabled = !Settings::load(self.store.as_ref()).await?.enabled;
        self.set_enabled(enabled).await?;
        Ok(enabled)
    }

    pub async fn set_badge_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.store
            .set(Entries::from([(BADGE_ENABLED_KEY.to_string(), enabled.into())]))
            .await?;
        let msg = if enabled {
            Message::UpdateBadge { max_shorts: None }
        } else {
            Message::ClearBadge
        };
        notify_background(self.messenger.as_ref(), msg).await;
        Ok(())
    }

    /// Drop today's counter and tell every open tab.
    pub async fn reset_count(&self) -> Result<BroadcastReport, StoreError> {
        counter::reset(self.store.as_ref(), self.today()).await?;
        info!("daily counter reset");
        let report = broadcast(self.messenger.as_ref(), &self.tabs, &Message::ResetCount).await;
        notify_background(self.messenger.as_ref(), Message::UpdateBadge { max_shorts: None }).await;
        Ok(report)
    }

    pub async fn history(&self) -> Result<Vec<(DayKey, u64)>, StoreError> {
        counter::history(self.store.as_ref()).await
    }

    fn today(&self) -> DayKey {
        DayKey::for_instant(&self.clock.now())
    }
}
