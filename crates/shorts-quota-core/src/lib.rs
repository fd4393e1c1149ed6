//! # Shorts Quota Core Library
//!
//! Engine behind a daily quota on short-form video views. A view counts once
//! a tab has dwelt on a short-form page past a threshold; once the day's
//! count reaches the user's limit, further short-form pages are covered by a
//! blocking overlay until the next calendar day.
//!
//! ## Architecture
//!
//! - **Store**: async key/value store shared by every context and the single
//!   source of truth (SQLite or in-memory)
//! - **Background**: stateless coordinator for the badge, the maintenance
//!   alarm and lifecycle hooks
//! - **Content agent**: one per tab; watches navigation, accrues dwell and
//!   gates the overlay
//! - **Control panel**: reads the day's state and applies user changes
//!
//! Nothing here owns a timer. Hosts call `tick()` with the current time,
//! which keeps every state machine deterministic under test.
//!
//! ## Key Components
//!
//! - [`ContentAgent`]: per-tab runtime
//! - [`AccrualMachine`]: dwell state machine
//! - [`BackgroundCoordinator`]: badge, sweep and lifecycle
//! - [`ControlPanel`]: user-facing operations
//! - [`Store`]: persistence seam

pub mod accrual;
pub mod background;
pub mod badge;
pub mod bus;
pub mod classifier;
pub mod clock;
pub mod content;
pub mod day_key;
pub mod error;
pub mod events;
pub mod navigation;
pub mod overlay;
pub mod panel;
pub mod pattern;
pub mod protocol;
pub mod retention;
pub mod storage;

pub use accrual::{AccrualMachine, AccrualPhase, AccrualTable, NavKey, TabId};
pub use background::{AlarmRegistry, BackgroundCoordinator, MemoryAlarms, MAINTENANCE_ALARM};
pub use badge::{BadgeSurface, MemoryBadge};
pub use bus::LocalBus;
pub use classifier::{is_short_form, PageSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content::ContentAgent;
pub use day_key::DayKey;
pub use error::{ConfigError, CoreError, DeliveryError, ParseError, StoreError, ValidationError};
pub use events::AgentEvent;
pub use navigation::{NavSignal, NavigationWatcher};
pub use overlay::{OverlayAction, OverlayController, OverlayHost, RecordingOverlay};
pub use panel::{ControlPanel, PanelView, ProgressTone, QuotaStatus};
pub use pattern::UrlPattern;
pub use protocol::{Ack, Message, Messenger, TabListener};
pub use retention::SweepReport;
pub use storage::{EngineConfig, InstallReason, MemoryStore, Settings, SqliteStore, Store};
