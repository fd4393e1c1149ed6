use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accrual::TabId;

/// Every state change in a content agent produces an Event.
/// Hosts drain them for logging; tests assert on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    NavigationSettled {
        tab: TabId,
        generation: u64,
        url: String,
        qualifies: bool,
        at: DateTime<Utc>,
    },
    ObservationStarted {
        tab: TabId,
        generation: u64,
        at: DateTime<Utc>,
    },
    /// Dwell threshold crossed; the view is counted.
    ViewCounted {
        tab: TabId,
        generation: u64,
        dwell_ms: u64,
        count: u64,
        limit: u32,
        at: DateTime<Utc>,
    },
    /// The store rejected the increment. The view is not retried.
    IncrementFailed {
        tab: TabId,
        generation: u64,
        message: String,
        at: DateTime<Utc>,
    },
    Blocked {
        tab: TabId,
        count: u64,
        limit: u32,
        at: DateTime<Utc>,
    },
    OverlayDismissed {
        tab: TabId,
        at: DateTime<Utc>,
    },
    SafePageRequested {
        tab: TabId,
        url: String,
        at: DateTime<Utc>,
    },
    CounterReset {
        tab: TabId,
        at: DateTime<Utc>,
    },
    EnabledChanged {
        tab: TabId,
        enabled: bool,
        at: DateTime<Utc>,
    },
    Unloaded {
        tab: TabId,
        at: DateTime<Utc>,
    },
}
