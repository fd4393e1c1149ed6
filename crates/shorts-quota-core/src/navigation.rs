//! Same-document navigation detection.
//!
//! Single-page hosts change the URL without reloading, and no event reports
//! it reliably. The watcher is fed two kinds of signal (structural DOM
//! mutation and history back/forward) and compares the URL each time. A
//! change is held for a settle delay so the new page's metadata can render,
//! then released by [`NavigationWatcher::poll`] as a fresh generation.
//!
//! Like the accrual machine, the watcher owns no timer: the host polls it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavSignal {
    DomMutation,
    HistoryPop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNavigation {
    pub url: String,
    pub due_at: DateTime<Utc>,
}

/// A navigation that has finished settling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledNavigation {
    pub generation: u64,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NavigationWatcher {
    last_url: String,
    generation: u64,
    pending: Option<PendingNavigation>,
    settle_delay: Duration,
}

impl NavigationWatcher {
    /// Watcher for a document first loaded at `initial_url` (generation 0).
    pub fn new(initial_url: impl Into<String>, settle_delay: Duration) -> Self {
        Self {
            last_url: initial_url.into(),
            generation: 0,
            pending: None,
            settle_delay,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_url(&self) -> &str {
        &self.last_url
    }

    pub fn pending(&self) -> Option<&PendingNavigation> {
        self.pending.as_ref()
    }

    /// Feed a signal. Returns `true` if a navigation is now scheduled.
    ///
    /// A change seen while another is still settling replaces it and
    /// restarts the delay, so rapid hops coalesce into one navigation.
    pub fn observe(&mut self, signal: NavSignal, current_url: &str, now: DateTime<Utc>) -> bool {
        if current_url == self.last_url {
            return false;
        }
        debug!(?signal, from = %self.last_url, to = %current_url, "url changed");
        self.last_url = current_url.to_string();
        self.pending = Some(PendingNavigation {
            url: current_url.to_string(),
            due_at: now + to_chrono(self.settle_delay),
        });
        true
    }

    /// Release the pending navigation once its settle delay has passed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<SettledNavigation> {
        let due = self.pending.as_ref().is_some_and(|p| now >= p.due_at);
        if !due {
            return None;
        }
        let pending = self.pending.take()?;
        self.generation += 1;
        Some(SettledNavigation {
            generation: self.generation,
            url: pending.url,
        })
    }

    /// Drop any pending navigation (document unload).
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

pub(crate) fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}
