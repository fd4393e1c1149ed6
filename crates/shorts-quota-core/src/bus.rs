//! In-process message bus.
//!
//! Routes messages between one background coordinator and any number of
//! registered content agents. Each agent sits behind its own async mutex,
//! so a message never runs concurrently with the agent's own callbacks.
//! Registry locks are released before a handler is awaited.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::accrual::TabId;
use crate::background::BackgroundCoordinator;
use crate::error::DeliveryError;
use crate::pattern::UrlPattern;
use crate::protocol::{Ack, Message, Messenger, TabInfo, TabListener};

pub type SharedListener = Arc<Mutex<dyn TabListener>>;

struct TabSlot {
    url: String,
    listener: Option<SharedListener>,
}

#[derive(Default)]
pub struct LocalBus {
    background: RwLock<Option<Arc<BackgroundCoordinator>>>,
    tabs: RwLock<BTreeMap<TabId, TabSlot>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach_background(&self, background: Arc<BackgroundCoordinator>) {
        *self.background.write().await = Some(background);
    }

    /// Simulate the host unloading the background context.
    pub async fn detach_background(&self) {
        *self.background.write().await = None;
    }

    /// Open a tab. `listener` is `None` for a page with no content agent.
    pub async fn register_tab(&self, tab: TabId, url: impl Into<String>, listener: Option<SharedListener>) {
        self.tabs.write().await.insert(
            tab,
            TabSlot {
                url: url.into(),
                listener,
            },
        );
    }

    pub async fn set_tab_url(&self, tab: TabId, url: impl Into<String>) {
        if let Some(slot) = self.tabs.write().await.get_mut(&tab) {
            slot.url = url.into();
        }
    }

    pub async fn unregister_tab(&self, tab: TabId) {
        self.tabs.write().await.remove(&tab);
    }
}

#[async_trait]
impl Messenger for LocalBus {
    async fn send_to_background(&self, msg: Message) -> Result<Ack, DeliveryError> {
        let background = self.background.read().await.clone();
        match background {
            Some(bg) => bg.handle(msg).await,
            None => Err(DeliveryError::BackgroundUnavailable),
        }
    }

    async fn send_to_tab(&self, tab: TabId, msg: Message) -> Result<Ack, DeliveryError> {
        let listener = self
            .tabs
            .read()
            .await
            .get(&tab)
            .and_then(|slot| slot.listener.clone());
        let Some(listener) = listener else {
            return Err(DeliveryError::NoReceiver(tab));
        };
        debug!(tab, kind = msg.kind(), "delivering to tab");
        let mut agent = listener.lock().await;
        agent.on_message(msg).await
    }

    async fn query_tabs(&self, pattern: &UrlPattern) -> Vec<TabInfo> {
        self.tabs
            .read()
            .await
            .iter()
            .filter(|(_, slot)| pattern.matches(&slot.url))
            .map(|(id, slot)| TabInfo {
                id: *id,
                url: slot.url.clone(),
            })
            .collect()
    }
}
