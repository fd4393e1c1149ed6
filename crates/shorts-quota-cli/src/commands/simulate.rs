//! Synthetic browsing session.
//!
//! Opens content agents on a virtual clock and walks them through short-form
//! pages, one view after another, round-robin across tabs. Tabs not taking
//! the current view stay on their last page.

use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use serde_json::json;
use shorts_quota_core::{
    AgentEvent, Clock, ContentAgent, EngineConfig, InstallReason, ManualClock, MemoryStore, NavSignal,
    PageSnapshot, RecordingOverlay, SqliteStore, Store, TabId,
};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CliResult, Host};

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of short-form pages to visit
    #[arg(long, default_value_t = 5)]
    pub views: u32,
    /// Seconds spent on each page
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u64).range(0..=86_400))]
    pub dwell_secs: u64,
    /// Tabs to spread the views over
    #[arg(long, default_value_t = 1)]
    pub tabs: u32,
    /// Use a throwaway in-memory store instead of the persistent one
    #[arg(long)]
    pub in_memory: bool,
    /// Print agent events to stderr as JSON lines
    #[arg(long)]
    pub events: bool,
}

struct SimTab {
    id: TabId,
    agent: Arc<Mutex<ContentAgent>>,
    overlay: RecordingOverlay,
}

pub async fn run(args: SimulateArgs) -> CliResult {
    if args.tabs == 0 {
        return Err("--tabs must be at least 1".into());
    }
    let config = EngineConfig::load_or_default();
    let step = config.accrual.poll_interval();
    if step.is_zero() {
        return Err("accrual.poll_interval_ms must be positive".into());
    }
    let step = chrono::Duration::from_std(step)?;
    let budget = chrono::Duration::from_std(config.navigation.settle_delay())?
        + chrono::Duration::seconds(i64::try_from(args.dwell_secs)?);

    let store: Arc<dyn Store> = if args.in_memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open()?)
    };
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let host = Host::with_store(store, config.clone(), clock.clone()).await;
    if args.in_memory {
        host.background.on_installed(InstallReason::Install).await?;
    }
    host.background.on_startup().await;

    let landing = config.site.safe_url.clone();
    let mut tabs = Vec::new();
    for id in 1..=args.tabs {
        let overlay = RecordingOverlay::new();
        let agent = Arc::new(Mutex::new(ContentAgent::new(
            id,
            PageSnapshot::new(landing.as_str()),
            host.store.clone(),
            host.bus.clone(),
            Box::new(overlay.clone()),
            config.clone(),
        )));
        host.bus
            .register_tab(id, landing.as_str(), Some(agent.clone()))
            .await;
        agent.lock().await.start(clock.now()).await;
        tabs.push(SimTab { id, agent, overlay });
    }

    let mut events: Vec<AgentEvent> = Vec::new();
    for view in 0..args.views {
        let tab = &tabs[(view % args.tabs) as usize];
        let url = format!("https://www.youtube.com/shorts/sim{view:04}");
        debug!(tab = tab.id, %url, "visiting");
        host.bus.set_tab_url(tab.id, url.as_str()).await;
        tab.agent
            .lock()
            .await
            .observe(NavSignal::DomMutation, PageSnapshot::new(url), clock.now());

        let mut elapsed = chrono::Duration::zero();
        while elapsed < budget {
            let now = clock.advance(step);
            elapsed += step;
            for t in &tabs {
                t.agent.lock().await.tick(now).await;
            }
        }
    }

    for t in &tabs {
        events.extend(t.agent.lock().await.drain_events());
    }
    if args.events {
        for event in &events {
            eprintln!("{}", serde_json::to_string(event)?);
        }
    }

    let counted = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::ViewCounted { .. }))
        .count();
    let blocked = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::Blocked { .. }))
        .count();
    let overlays: Vec<TabId> = tabs
        .iter()
        .filter(|t| t.overlay.record().attached > 0)
        .map(|t| t.id)
        .collect();
    let status = host.panel()?.load().await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "views": args.views,
            "counted": counted,
            "blocked": blocked,
            "overlays": overlays,
            "badge": host.badge.text(),
            "status": status,
        }))?
    );
    Ok(())
}
