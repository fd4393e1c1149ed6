//! Dwell accrual state machine.
//!
//! Converts sustained presence on a qualifying page into at most one counter
//! increment per navigation. Like the rest of the engine it owns no timer:
//! the host calls [`AccrualMachine::poll`] on a fixed cadence with the
//! current time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Observing -> Accrued
//!              \          \
//!               `-> Blocked <-'
//! Idle -> Blocked              (limit already reached at entry)
//! ```
//!
//! Machines live in an [`AccrualTable`] keyed by `(tab, generation)`. A new
//! navigation on a tab discards the old entry, so a poll addressed to a
//! stale navigation finds nothing and cannot touch the counter.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


pub type TabId = u32;

/// Identity of one navigation in one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavKey {
    pub tab: TabId,
    pub generation: u64,
}

impl NavKey {
    pub fn new(tab: TabId, generation: u64) -> Self {
        Self { tab, generation }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccrualPhase {
    Idle,
    Observing,
    /// The view has been counted. Terminal for this navigation.
    Accrued,
    Blocked,
}

/// Inputs read from the store at navigation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub enabled: bool,
    pub count: u64,
    pub limit: u32,
}

impl Gate {
    pub fn limit_reached(&self) -> bool {
        self.count >= u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Not a qualifying page, or the extension is off.
    Ignored,
    Observing,
    Blocked,
}

/// Per-navigation accrual state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualMachine {
    nav: NavKey,
    phase: AccrualPhase,
    dwell_started_at: Option<DateTime<Utc>>,
    has_incremented: bool,
    poll_armed: bool,
    threshold: Duration,
}

impl AccrualMachine {
    pub fn new(nav: NavKey, threshold: Duration) -> Self {
        Self {
            nav,
            phase: AccrualPhase::Idle,
            dwell_started_at: None,
            has_incremented: false,
            poll_armed: false,
            threshold,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn nav(&self) -> NavKey {
        self.nav
    }

    pub fn phase(&self) -> AccrualPhase {
        self.phase
    }

    pub fn dwell_started_at(&self) -> Option<DateTime<Utc>> {
        self.dwell_started_at
    }

    pub fn has_incremented(&self) -> bool {
        self.has_incremented
    }

    pub fn is_polling(&self) -> bool {
        self.poll_armed
    }

    pub fn dwell(&self, now: DateTime<Utc>) -> Duration {
        self.dwell_started_at
            .and_then(|start| (now - start).to_std().ok())
            .unwrap_or_default()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Entry procedure for a freshly settled navigation.
    pub fn enter(&mut self, qualifies: bool, gate: Gate, now: DateTime<Utc>) -> Entry {
        if self.phase != AccrualPhase::Idle || !qualifies || !gate.enabled {
            return Entry::Ignored;
        }
        if gate.limit_reached() {
            // Already counted on an earlier navigation.
            self.block();
            return Entry::Blocked;
        }
        self.phase = AccrualPhase::Observing;
        self.dwell_started_at = Some(now);
        self.poll_armed = true;
        Entry::Observing
    }

    /// Dwell check. Returns the dwell once, at the moment the view should
    /// be counted; every later call returns `None`.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.poll_armed || self.phase != AccrualPhase::Observing || self.has_incremented {
            return None;
        }
        let dwell = self.dwell(now);
        if dwell <= self.threshold {
            return None;
        }
        self.has_incremented = true;
        self.poll_armed = false;
        self.phase = AccrualPhase::Accrued;
        Some(dwell)
    }

    /// Feed back the count written by the increment. Returns `true` when the
    /// machine moved to `Blocked`.
    pub fn record_count(&mut self, count: u64, limit: u32) -> bool {
        if self.phase == AccrualPhase::Accrued && count >= u64::from(limit) {
            self.block();
            return true;
        }
        false
    }

    pub fn block(&mut self) {
        self.phase = AccrualPhase::Blocked;
        self.poll_armed = false;
    }

    /// Overlay dismissed: unblock this navigation only.
    pub fn dismiss(&mut self) {
        if self.phase == AccrualPhase::Blocked {
            self.phase = if self.has_incremented {
                AccrualPhase::Accrued
            } else {
                AccrualPhase::Idle
            };
        }
    }

    /// Stop everything without counting (disable, reset, unload).
    pub fn halt(&mut self) {
        self.phase = AccrualPhase::Idle;
        self.poll_armed = false;
        self.dwell_started_at = None;
    }
}

/// Live accrual machines, at most one per tab.
#[derive(Debug, Default)]
pub struct AccrualTable {
    machines: HashMap<NavKey, AccrualMachine>,
}

impl AccrualTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `nav`, discarding whatever the tab tracked before.
    pub fn begin(&mut self, nav: NavKey, threshold: Duration) -> &mut AccrualMachine {
        self.discard_tab(nav.tab);
        self.machines
            .entry(nav)
            .or_insert_with(|| AccrualMachine::new(nav, threshold))
    }

    pub fn get(&self, nav: NavKey) -> Option<&AccrualMachine> {
        self.machines.get(&nav)
    }

    pub fn get_mut(&mut self, nav: NavKey) -> Option<&mut AccrualMachine> {
        self.machines.get_mut(&nav)
    }

    /// The machine for the tab's current navigation, if any.
    pub fn current_mut(&mut self, tab: TabId) -> Option<&mut AccrualMachine> {
        self.machines.values_mut().find(|m| m.nav.tab == tab)
    }

    pub fn current(&self, tab: TabId) -> Option<&AccrualMachine> {
        self.machines.values().find(|m| m.nav.tab == tab)
    }

    pub fn discard_tab(&mut self, tab: TabId) {
        self.machines.retain(|nav, _| nav.tab != tab);
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(5_000);

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    fn open_gate(count: u64) -> Gate {
        Gate {
            enabled: true,
            count,
            limit: 5,
        }
    }

    fn machine() -> AccrualMachine {
        AccrualMachine::new(NavKey::new(1, 0), THRESHOLD)
    }

    #[test]
    fn counts_once_after_threshold() {
        let mut m = machine();
        assert_eq!(m.enter(true, open_gate(0), t(0)), Entry::Observing);
        assert_eq!(m.phase(), AccrualPhase::Observing);

        // Threshold must be strictly exceeded.
        assert!(m.poll(t(5_000)).is_none());
        assert_eq!(m.poll(t(6_000)), Some(Duration::from_millis(6_000)));
        assert_eq!(m.phase(), AccrualPhase::Accrued);

        for s in 7..60 {
            assert!(m.poll(t(s * 1_000)).is_none());
        }
        assert!(m.has_incremented());
        assert!(!m.is_polling());
    }

    #[test]
    fn non_qualifying_or_disabled_stays_idle() {
        let mut m = machine();
        assert_eq!(m.enter(false, open_gate(0), t(0)), Entry::Ignored);
        let mut off = open_gate(0);
        off.enabled = false;
        assert_eq!(m.enter(true, off, t(0)), Entry::Ignored);
        assert_eq!(m.phase(), AccrualPhase::Idle);
        assert!(m.poll(t(60_000)).is_none());
    }

    #[test]
    fn limit_reached_at_entry_blocks_without_counting() {
        let mut m = machine();
        assert_eq!(m.enter(true, open_gate(5), t(0)), Entry::Blocked);
        assert_eq!(m.phase(), AccrualPhase::Blocked);
        assert!(m.poll(t(60_000)).is_none());
        assert!(!m.has_incremented());
    }

    #[test]
    fn reaching_limit_after_increment_blocks() {
        let mut m = machine();
        m.enter(true, open_gate(4), t(0));
        m.poll(t(5_001)).unwrap();
        assert!(m.record_count(5, 5));
        assert_eq!(m.phase(), AccrualPhase::Blocked);
    }

    #[test]
    fn below_limit_stays_accrued() {
        let mut m = machine();
        m.enter(true, open_gate(1), t(0));
        m.poll(t(5_001)).unwrap();
        assert!(!m.record_count(2, 5));
        assert_eq!(m.phase(), AccrualPhase::Accrued);
    }

    #[test]
    fn halt_cancels_pending_accrual() {
        let mut m = machine();
        m.enter(true, open_gate(0), t(0));
        m.halt();
        assert_eq!(m.phase(), AccrualPhase::Idle);
        assert!(m.poll(t(60_000)).is_none());
        assert!(!m.has_incremented());
    }

    #[test]
    fn dismiss_unblocks_this_navigation() {
        let mut m = machine();
        m.enter(true, open_gate(5), t(0));
        m.dismiss();
        assert_eq!(m.phase(), AccrualPhase::Idle);
        // Dismissal does not re-arm counting on the same navigation.
        assert!(m.poll(t(60_000)).is_none());
    }

    #[test]
    fn table_keeps_one_navigation_per_tab() {
        let mut table = AccrualTable::new();
        table.begin(NavKey::new(1, 0), THRESHOLD);
        table.begin(NavKey::new(2, 0), THRESHOLD);
        table.begin(NavKey::new(1, 1), THRESHOLD);

        assert_eq!(table.len(), 2);
        assert!(table.get(NavKey::new(1, 0)).is_none());
        assert_eq!(table.current(1).unwrap().nav(), NavKey::new(1, 1));

        table.discard_tab(2);
        assert!(table.current(2).is_none());
    }
}
