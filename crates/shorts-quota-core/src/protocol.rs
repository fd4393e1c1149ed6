//! Cross-context messages.
//!
//! Wire shape is `{ "type": "UPDATE_BADGE", ...payload }`. Delivery is
//! at-most-once and best-effort: a send to a context with no listener is
//! expected (most tabs have no live agent) and is dropped by the sender.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accrual::TabId;
use crate::error::DeliveryError;
use crate::pattern::UrlPattern;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Ask background to recompute the remaining-quota badge.
    UpdateBadge {
        #[serde(
            rename = "maxShorts",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        max_shorts: Option<u32>,
    },
    ClearBadge,
    /// Tell a content agent its counter and block state are reset.
    ResetCount,
    ToggleExtension {
        enabled: bool,
    },
    /// Ask background for today's count.
    GetShortsCount,
    /// Ask background to drop today's counter.
    ResetShortsCount,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::UpdateBadge { .. } => "UPDATE_BADGE",
            Message::ClearBadge => "CLEAR_BADGE",
            Message::ResetCount => "RESET_COUNT",
            Message::ToggleExtension { .. } => "TOGGLE_EXTENSION",
            Message::GetShortsCount => "GET_SHORTS_COUNT",
            Message::ResetShortsCount => "RESET_SHORTS_COUNT",
        }
    }
}

/// Optional acknowledgement returned to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ack {
    Success { success: bool },
    Count { count: u64 },
}

impl Ack {
    pub fn ok() -> Self {
        Ack::Success { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// Transport between contexts.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_to_background(&self, msg: Message) -> Result<Ack, DeliveryError>;

    async fn send_to_tab(&self, tab: TabId, msg: Message) -> Result<Ack, DeliveryError>;

    /// Open tabs whose URL matches `pattern`.
    async fn query_tabs(&self, pattern: &UrlPattern) -> Vec<TabInfo>;
}

/// Receiving side of a content agent.
#[async_trait]
pub trait TabListener: Send {
    async fn on_message(&mut self, msg: Message) -> Result<Ack, DeliveryError>;
}

/// Send to background and drop any delivery failure.
pub async fn notify_background(messenger: &dyn Messenger, msg: Message) -> Option<Ack> {
    let kind = msg.kind();
    match messenger.send_to_background(msg).await {
        Ok(ack) => Some(ack),
        Err(e) => {
            debug!(kind, error = %e, "background notification dropped");
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub delivered: Vec<TabId>,
    pub failed: Vec<TabId>,
}

/// Send `msg` to every tab matching `pattern`, one at a time.
///
/// A failed send is recorded and the fan-out continues.
pub async fn broadcast(
    messenger: &dyn Messenger,
    pattern: &UrlPattern,
    msg: &Message,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for tab in messenger.query_tabs(pattern).await {
        match messenger.send_to_tab(tab.id, msg.clone()).await {
            Ok(_) => report.delivered.push(tab.id),
            Err(e) => {
                debug!(tab = tab.id, kind = msg.kind(), error = %e, "tab send dropped");
                report.failed.push(tab.id);
            }
        }
    }
    report
}
