pub mod config;
pub mod history;
pub mod lifecycle;
pub mod settings;
pub mod simulate;
pub mod status;
pub mod sweep;

use std::sync::Arc;

use shorts_quota_core::{
    BackgroundCoordinator, Clock, ControlPanel, EngineConfig, LocalBus, MemoryAlarms,
    MemoryBadge, SqliteStore, Store, SystemClock, UrlPattern,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// One CLI invocation's view of the extension: the persistent store with a
/// background coordinator attached to an otherwise empty bus.
pub struct Host {
    pub store: Arc<dyn Store>,
    pub bus: Arc<LocalBus>,
    pub badge: Arc<MemoryBadge>,
    pub background: Arc<BackgroundCoordinator>,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
}

impl Host {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open()?);
        Ok(Self::with_store(store, EngineConfig::load()?, Arc::new(SystemClock)).await)
    }

    pub async fn with_store(store: Arc<dyn Store>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let badge = Arc::new(MemoryBadge::new());
        let background = Arc::new(BackgroundCoordinator::new(
            store.clone(),
            badge.clone(),
            Arc::new(MemoryAlarms::new()),
            clock.clone(),
            config.clone(),
        ));
        let bus = Arc::new(LocalBus::new());
        bus.attach_background(background.clone()).await;
        Self {
            store,
            bus,
            badge,
            background,
            clock,
            config,
        }
    }

    pub fn panel(&self) -> Result<ControlPanel, Box<dyn std::error::Error>> {
        let tabs: UrlPattern = self.config.site.tab_pattern.parse()?;
        Ok(ControlPanel::new(
            self.store.clone(),
            self.bus.clone(),
            tabs,
            self.clock.clone(),
        ))
    }
}
