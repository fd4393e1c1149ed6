//! Background coordinator.
//!
//! The host may unload the background context between any two events, so the
//! coordinator keeps nothing of its own: each entry point re-reads what it
//! needs from the store. Constructing a fresh coordinator is equivalent to a
//! restart.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tracing::{info, warn};

use crate::badge::{self, BadgeSurface};
use crate::clock::Clock;
use crate::day_key::DayKey;
use crate::error::{DeliveryError, StoreError};
use crate::protocol::{Ack, Message};
use crate::retention::{self, SweepReport};
use crate::storage::settings::{max_shorts_from_value, MAX_SHORTS_KEY, SETTINGS_KEYS};
use crate::storage::{counter, EngineConfig, InstallReason, Settings, Store};

/// Name of the periodic maintenance task.
pub const MAINTENANCE_ALARM: &str = "cleanupOldData";

/// Host scheduler for named periodic tasks that outlive the background.
#[async_trait]
pub trait AlarmRegistry: Send + Sync {
    /// Register `name` to fire every `period`. Registering an existing name
    /// replaces it rather than adding a second schedule.
    async fn create(&self, name: &str, period: Duration);
}

/// Alarm registry held in memory.
#[derive(Debug, Default)]
pub struct MemoryAlarms {
    alarms: Mutex<BTreeMap<String, Duration>>,
}

impl MemoryAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alarms(&self) -> BTreeMap<String, Duration> {
        self.alarms.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AlarmRegistry for MemoryAlarms {
    async fn create(&self, name: &str, period: Duration) {
        if let Ok(mut alarms) = self.alarms.lock() {
            alarms.insert(name.to_string(), period);
        }
    }
}

pub struct BackgroundCoordinator {
    store: Arc<dyn Store>,
    badge: Arc<dyn BadgeSurface>,
    alarms: Arc<dyn AlarmRegistry>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl BackgroundCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        badge: Arc<dyn BadgeSurface>,
        alarms: Arc<dyn AlarmRegistry>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            badge,
            alarms,
            clock,
            config,
        }
    }

    /// Runs every time the background context starts.
    pub async fn on_startup(&self) {
        self.alarms
            .create(MAINTENANCE_ALARM, self.config.retention.sweep_period())
            .await;
        info!(alarm = MAINTENANCE_ALARM, "maintenance alarm registered");
    }

    pub async fn on_installed(&self, reason: InstallReason) -> Result<(), StoreError> {
        Settings::on_installed(self.store.as_ref(), reason).await
    }

    /// Alarm dispatch. Returns the sweep report for the maintenance alarm.
    pub async fn on_alarm(&self, name: &str) -> Result<Option<SweepReport>, StoreError> {
        if name != MAINTENANCE_ALARM {
            return Ok(None);
        }
        self.run_sweep().await.map(Some)
    }

    pub async fn run_sweep(&self) -> Result<SweepReport, StoreError> {
        let today = self.clock.now().with_timezone(&Local).date_naive();
        retention::sweep(
            self.store.as_ref(),
            today,
            self.config.retention.horizon_days,
        )
        .await
    }

    pub async fn handle(&self, msg: Message) -> Result<Ack, DeliveryError> {
        let kind = msg.kind();
        let result = match msg {
            Message::UpdateBadge { max_shorts } => {
                self.refresh_badge(max_shorts).await.map(|_| Ack::ok())
            }
            Message::ClearBadge => {
                self.badge.set_text("").await;
                Ok(Ack::ok())
            }
            Message::GetShortsCount => counter::read(self.store.as_ref(), self.today())
                .await
                .map(|count| Ack::Count { count }),
            Message::ResetShortsCount => counter::reset(self.store.as_ref(), self.today())
                .await
                .map(|_| Ack::ok()),
            Message::ResetCount | Message::ToggleExtension { .. } => {
                return Err(DeliveryError::Unhandled(kind));
            }
        };
        result.map_err(|e| {
            warn!(kind, error = %e, "background request failed");
            DeliveryError::Receiver(e.to_string())
        })
    }

    /// Recompute and display the badge. Returns the text shown, if any.
    ///
    /// `hint` stands in for `maxShorts` only when the store has none.
    pub async fn refresh_badge(&self, hint: Option<u32>) -> Result<Option<String>, StoreError> {
        let entries = self.store.get(&SETTINGS_KEYS).await?;

        let mut settings = Settings::from_entries(&entries);
        if entries.get(MAX_SHORTS_KEY).and_then(max_shorts_from_value).is_none() {
            if let Some(hint) = hint.filter(|h| *h > 0) {
                settings.max_shorts = hint;
            }
        }
        let count = counter::read(self.store.as_ref(), self.today()).await?;

        let text = badge::project(&settings, count, self.config.badge.max_display);
        self.badge.set_text(text.as_deref().unwrap_or("")).await;
        Ok(text)
    }

    fn today(&self) -> DayKey {
        DayKey::for_instant(&self.clock.now())
    }
}
