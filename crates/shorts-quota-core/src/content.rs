//! Per-tab content agent.
//!
//! One agent per tab document. It is single-threaded and cooperative: every
//! entry point takes `&mut self`, so DOM signals, poll ticks and messages
//! interleave but never overlap.
//!
//! The host drives it:
//! - [`ContentAgent::start`] once, when the document loads
//! - [`ContentAgent::observe`] on DOM mutation or history pop
//! - [`ContentAgent::tick`] every poll interval (1 s)
//! - [`ContentAgent::unload`] when the document goes away
//!
//! Settings and today's count are re-read from the store on every
//! navigation; the copies held here are caches for rendering and gating.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::accrual::{AccrualPhase, AccrualTable, Entry, Gate, NavKey, TabId};
use crate::classifier::{is_short_form, PageSnapshot};
use crate::day_key::DayKey;
use crate::error::DeliveryError;
use crate::events::AgentEvent;
use crate::navigation::{NavSignal, NavigationWatcher};
use crate::overlay::{OverlayAction, OverlayController, OverlayHost};
use crate::protocol::{notify_background, Ack, Message, Messenger, TabListener};
use crate::storage::{counter, EngineConfig, Settings, Store};

pub struct ContentAgent {
    tab: TabId,
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    overlay: OverlayController,
    watcher: NavigationWatcher,
    accruals: AccrualTable,
    config: EngineConfig,
    settings: Settings,
    count: u64,
    page: PageSnapshot,
    unloaded: bool,
    events: Vec<AgentEvent>,
}

impl ContentAgent {
    pub fn new(
        tab: TabId,
        page: PageSnapshot,
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        overlay: Box<dyn OverlayHost>,
        config: EngineConfig,
    ) -> Self {
        let watcher = NavigationWatcher::new(page.url.clone(), config.navigation.settle_delay());
        let overlay = OverlayController::new(overlay, config.site.safe_url.clone());
        Self {
            tab,
            store,
            messenger,
            overlay,
            watcher,
            accruals: AccrualTable::new(),
            config,
            settings: Settings::default(),
            count: 0,
            page,
            unloaded: false,
            events: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn page(&self) -> &PageSnapshot {
        &self.page
    }

    pub fn overlay_shown(&self) -> bool {
        self.overlay.is_shown()
    }

    pub fn current_nav(&self) -> NavKey {
        NavKey::new(self.tab, self.watcher.generation())
    }

    pub fn phase(&self) -> AccrualPhase {
        self.accruals
            .get(self.current_nav())
            .map(|m| m.phase())
            .unwrap_or(AccrualPhase::Idle)
    }

    pub fn has_incremented(&self) -> bool {
        self.accruals
            .get(self.current_nav())
            .is_some_and(|m| m.has_incremented())
    }

    /// Take the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<AgentEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Document load: read state, ask for a badge refresh, classify the
    /// initial page.
    pub async fn start(&mut self, now: DateTime<Utc>) {
        self.reload_state(now).await;
        if self.settings.badge_enabled {
            notify_background(self.messenger.as_ref(), Message::UpdateBadge { max_shorts: None })
                .await;
        }
        self.enter_navigation(self.watcher.generation(), now).await;
    }

    /// DOM mutation or history pop with the document as it is now.
    pub fn observe(&mut self, signal: NavSignal, page: PageSnapshot, now: DateTime<Utc>) {
        if self.unloaded {
            return;
        }
        let changed = self.watcher.observe(signal, &page.url, now);
        self.page = page;
        if changed {
            // Navigated away: whatever was being timed stops now.
            if let Some(m) = self.accruals.current_mut(self.tab) {
                m.halt();
            }
        }
    }

    /// One poll step: settle navigation, then check dwell.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        if self.unloaded {
            return;
        }
        if let Some(nav) = self.watcher.poll(now) {
            self.enter_navigation(nav.generation, now).await;
        }
        self.poll_dwell(now).await;
    }

    /// Document teardown. Pending settle and dwell polls are dropped.
    pub fn unload(&mut self, now: DateTime<Utc>) {
        self.watcher.cancel();
        self.accruals.discard_tab(self.tab);
        self.unloaded = true;
        self.events.push(AgentEvent::Unloaded { tab: self.tab, at: now });
    }

    pub fn on_overlay_action(&mut self, action: OverlayAction, now: DateTime<Utc>) {
        match action {
            OverlayAction::Dismiss => {
                if self.overlay.hide() {
                    if let Some(m) = self.accruals.get_mut(self.current_nav()) {
                        m.dismiss();
                    }
                    self.events.push(AgentEvent::OverlayDismissed { tab: self.tab, at: now });
                }
            }
            OverlayAction::GoToSafePage => {
                let url = self.overlay.go_to_safe_page();
                self.events.push(AgentEvent::SafePageRequested {
                    tab: self.tab,
                    url,
                    at: now,
                });
            }
        }
    }

    // ── Messages ─────────────────────────────────────────────────────

    pub async fn handle_message(&mut self, msg: Message, now: DateTime<Utc>) -> Result<Ack, DeliveryError> {
        if self.unloaded {
            return Err(DeliveryError::NoReceiver(self.tab));
        }
        match msg {
            Message::ResetCount => {
                self.count = 0;
                if let Some(m) = self.accruals.get_mut(self.current_nav()) {
                    if m.phase() == AccrualPhase::Blocked {
                        m.halt();
                    }
                }
                self.overlay.hide();
                info!(tab = self.tab, "local counter reset");
                self.events.push(AgentEvent::CounterReset { tab: self.tab, at: now });
                Ok(Ack::ok())
            }
            Message::ToggleExtension { enabled } => {
                self.settings.enabled = enabled;
                if !enabled {
                    self.overlay.hide();
                    if let Some(m) = self.accruals.get_mut(self.current_nav()) {
                        m.halt();
                    }
                }
                self.events.push(AgentEvent::EnabledChanged {
                    tab: self.tab,
                    enabled,
                    at: now,
                });
                Ok(Ack::ok())
            }
            other => Err(DeliveryError::Unhandled(other.kind())),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn reload_state(&mut self, now: DateTime<Utc>) {
        self.settings = Settings::load_or_default(self.store.as_ref()).await;
        match counter::read(self.store.as_ref(), DayKey::for_instant(&now)).await {
            Ok(count) => self.count = count,
            Err(e) => warn!(tab = self.tab, error = %e, "count unavailable, keeping cached value"),
        }
    }

    async fn enter_navigation(&mut self, generation: u64, now: DateTime<Utc>) {
        self.reload_state(now).await;

        let nav = NavKey::new(self.tab, generation);
        let qualifies = is_short_form(&self.page);
        self.events.push(AgentEvent::NavigationSettled {
            tab: self.tab,
            generation,
            url: self.page.url.clone(),
            qualifies,
            at: now,
        });

        if !qualifies {
            // Left the short-form page.
            self.overlay.hide();
        }

        let gate = Gate {
            enabled: self.settings.enabled,
            count: self.count,
            limit: self.settings.max_shorts,
        };
        let entry = self
            .accruals
            .begin(nav, self.config.accrual.dwell_threshold())
            .enter(qualifies, gate, now);

        match entry {
            Entry::Ignored => {}
            Entry::Observing => {
                self.events.push(AgentEvent::ObservationStarted {
                    tab: self.tab,
                    generation,
                    at: now,
                });
            }
            Entry::Blocked => self.show_block(now),
        }
    }

    async fn poll_dwell(&mut self, now: DateTime<Utc>) {
        let nav = self.current_nav();
        let Some(dwell) = self.accruals.get_mut(nav).and_then(|m| m.poll(now)) else {
            return;
        };
        if !self.settings.enabled {
            return;
        }

        let limit = self.settings.max_shorts;
        match counter::increment(self.store.as_ref(), DayKey::for_instant(&now)).await {
            Ok(count) => {
                self.count = count;
                self.events.push(AgentEvent::ViewCounted {
                    tab: self.tab,
                    generation: nav.generation,
                    dwell_ms: u64::try_from(dwell.as_millis()).unwrap_or(u64::MAX),
                    count,
                    limit,
                    at: now,
                });
                notify_background(
                    self.messenger.as_ref(),
                    Message::UpdateBadge {
                        max_shorts: Some(limit),
                    },
                )
                .await;

                let blocked = self
                    .accruals
                    .get_mut(nav)
                    .is_some_and(|m| m.record_count(count, limit));
                if blocked {
                    self.show_block(now);
                }
            }
            Err(e) => {
                warn!(tab = self.tab, error = %e, "increment failed");
                self.events.push(AgentEvent::IncrementFailed {
                    tab: self.tab,
                    generation: nav.generation,
                    message: e.to_string(),
                    at: now,
                });
            }
        }
    }

    fn show_block(&mut self, now: DateTime<Utc>) {
        if !self.settings.enabled {
            return;
        }
        if self.overlay.show(self.count, self.settings.max_shorts) {
            info!(tab = self.tab, count = self.count, limit = self.settings.max_shorts, "limit reached, blocking");
            self.events.push(AgentEvent::Blocked {
                tab: self.tab,
                count: self.count,
                limit: self.settings.max_shorts,
                at: now,
            });
        }
    }
}

#[async_trait]
impl TabListener for ContentAgent {
    async fn on_message(&mut self, msg: Message) -> Result<Ack, DeliveryError> {
        self.handle_message(msg, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::RecordingOverlay;
    use crate::pattern::UrlPattern;
    use crate::protocol::TabInfo;
    use crate::storage::{Entries, MemoryStore};
    use serde_json::Value;
    use std::sync::Mutex;

    const SHORT: &str = "https://www.youtube.com/shorts/abc123";
    const HOME: &str = "https://www.youtube.com/";

    /// Records what the agent sends to the background.
    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<Message>>,
    }

    impl Outbox {
        fn sent(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for Outbox {
        async fn send_to_background(&self, msg: Message) -> Result<Ack, DeliveryError> {
            self.sent.lock().unwrap().push(msg);
            Ok(Ack::ok())
        }

        async fn send_to_tab(&self, tab: TabId, _msg: Message) -> Result<Ack, DeliveryError> {
            Err(DeliveryError::NoReceiver(tab))
        }

        async fn query_tabs(&self, _pattern: &UrlPattern) -> Vec<TabInfo> {
            Vec::new()
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_790_000_000_000 + secs * 1_000).unwrap()
    }

    fn today_key() -> String {
        DayKey::for_instant(&t(0)).to_string()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        outbox: Arc<Outbox>,
        overlay: RecordingOverlay,
    }

    impl Fixture {
        fn new(entries: Entries) -> Self {
            Self {
                store: Arc::new(MemoryStore::with_entries(entries)),
                outbox: Arc::new(Outbox::default()),
                overlay: RecordingOverlay::new(),
            }
        }

        fn agent(&self, url: &str) -> ContentAgent {
            ContentAgent::new(
                7,
                PageSnapshot::new(url),
                self.store.clone(),
                self.outbox.clone(),
                Box::new(self.overlay.clone()),
                EngineConfig::default(),
            )
        }

        fn count(&self) -> u64 {
            self.store
                .snapshot()
                .get(&today_key())
                .and_then(Value::as_u64)
                .unwrap_or(0)
        }
    }

    fn with_count(count: u64) -> Entries {
        Entries::from([
            ("maxShorts".to_string(), Value::from(5)),
            (today_key(), Value::from(count)),
        ])
    }

    #[tokio::test]
    async fn counts_short_after_dwell() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        assert_eq!(agent.phase(), AccrualPhase::Observing);

        for s in 1..=5 {
            agent.tick(t(s)).await;
        }
        assert_eq!(fx.count(), 0);

        agent.tick(t(6)).await;
        assert_eq!(fx.count(), 1);
        assert_eq!(agent.count(), 1);
        assert_eq!(agent.phase(), AccrualPhase::Accrued);

        for s in 7..30 {
            agent.tick(t(s)).await;
        }
        assert_eq!(fx.count(), 1);
        assert!(fx
            .outbox
            .sent()
            .contains(&Message::UpdateBadge { max_shorts: Some(5) }));
    }

    #[tokio::test]
    async fn startup_asks_for_badge_only_when_enabled() {
        let fx = Fixture::new(with_count(0));
        fx.agent(HOME).start(t(0)).await;
        assert_eq!(fx.outbox.sent(), vec![Message::UpdateBadge { max_shorts: None }]);

        let mut entries = with_count(0);
        entries.insert("badgeEnabled".into(), Value::Bool(false));
        let fx = Fixture::new(entries);
        fx.agent(HOME).start(t(0)).await;
        assert!(fx.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn reaching_limit_shows_overlay() {
        let fx = Fixture::new(with_count(4));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        agent.tick(t(6)).await;

        assert_eq!(fx.count(), 5);
        assert_eq!(agent.phase(), AccrualPhase::Blocked);
        let record = fx.overlay.record();
        assert_eq!(record.attached, 1);
        assert_eq!(record.last_view.unwrap().count, 5);
    }

    #[tokio::test]
    async fn navigating_away_before_threshold_does_not_count() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        agent.tick(t(3)).await;

        agent.observe(NavSignal::DomMutation, PageSnapshot::new(HOME), t(3));
        for s in 4..20 {
            agent.tick(t(s)).await;
        }
        assert_eq!(fx.count(), 0);
        assert_eq!(agent.phase(), AccrualPhase::Idle);
    }

    #[tokio::test]
    async fn new_short_is_counted_separately() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        agent.tick(t(6)).await;

        agent.observe(
            NavSignal::DomMutation,
            PageSnapshot::new("https://www.youtube.com/shorts/next"),
            t(10),
        );
        // Settles one second later, counts five seconds after that.
        for s in 11..=17 {
            agent.tick(t(s)).await;
        }
        assert_eq!(fx.count(), 2);
    }

    #[tokio::test]
    async fn already_at_limit_blocks_on_entry() {
        let fx = Fixture::new(with_count(5));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        assert!(agent.overlay_shown());
        agent.tick(t(10)).await;
        assert_eq!(fx.count(), 5);
    }

    #[tokio::test]
    async fn disabled_agent_never_counts_or_blocks() {
        let mut entries = with_count(9);
        entries.insert("enabled".into(), Value::Bool(false));
        let fx = Fixture::new(entries);
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        agent.tick(t(10)).await;
        assert!(!agent.overlay_shown());
        assert_eq!(fx.count(), 9);
    }

    #[tokio::test]
    async fn toggle_off_hides_overlay_and_stops_dwell() {
        let fx = Fixture::new(with_count(5));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        assert!(agent.overlay_shown());

        let ack = agent
            .handle_message(Message::ToggleExtension { enabled: false }, t(1))
            .await
            .unwrap();
        assert_eq!(ack, Ack::ok());
        assert!(!agent.overlay_shown());
        assert_eq!(fx.overlay.record().attached, 0);
        assert_eq!(agent.phase(), AccrualPhase::Idle);
    }

    #[tokio::test]
    async fn toggle_off_mid_dwell_never_counts() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        for s in 1..=3 {
            agent.tick(t(s)).await;
        }
        assert_eq!(agent.phase(), AccrualPhase::Observing);

        agent
            .handle_message(Message::ToggleExtension { enabled: false }, t(3))
            .await
            .unwrap();
        for s in 4..=13 {
            agent.tick(t(s)).await;
        }

        assert_eq!(agent.phase(), AccrualPhase::Idle);
        assert!(!agent.has_incremented());
        assert_eq!(fx.count(), 0);
        assert!(!agent.overlay_shown());
    }

    #[tokio::test]
    async fn reset_clears_block() {
        let fx = Fixture::new(with_count(5));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;

        agent.handle_message(Message::ResetCount, t(1)).await.unwrap();
        assert_eq!(agent.count(), 0);
        assert_eq!(agent.phase(), AccrualPhase::Idle);
        assert!(!agent.overlay_shown());
    }

    #[tokio::test]
    async fn background_messages_are_unhandled() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(HOME);
        assert_eq!(
            agent.handle_message(Message::ClearBadge, t(0)).await,
            Err(DeliveryError::Unhandled("CLEAR_BADGE"))
        );
    }

    #[tokio::test]
    async fn failed_increment_is_not_retried() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        fx.store.fail_next_writes(1);
        agent.tick(t(6)).await;
        for s in 7..20 {
            agent.tick(t(s)).await;
        }
        assert_eq!(fx.count(), 0);
        assert!(agent
            .drain_events()
            .iter()
            .any(|e| matches!(e, AgentEvent::IncrementFailed { .. })));
    }

    #[tokio::test]
    async fn dismiss_and_safe_page() {
        let fx = Fixture::new(with_count(5));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;

        agent.on_overlay_action(OverlayAction::GoToSafePage, t(1));
        assert_eq!(fx.overlay.record().navigations, vec![HOME.to_string()]);

        agent.on_overlay_action(OverlayAction::Dismiss, t(2));
        assert!(!agent.overlay_shown());
        agent.tick(t(20)).await;
        assert!(!agent.overlay_shown());
    }

    #[tokio::test]
    async fn unload_drops_pending_work() {
        let fx = Fixture::new(with_count(0));
        let mut agent = fx.agent(SHORT);
        agent.start(t(0)).await;
        agent.unload(t(2));
        agent.tick(t(10)).await;
        assert_eq!(fx.count(), 0);
        assert!(agent.handle_message(Message::ResetCount, t(11)).await.is_err());
    }
}
