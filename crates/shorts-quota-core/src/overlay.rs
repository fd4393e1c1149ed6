//! Enforcement overlay gate.
//!
//! The controller owns presence; the host owns markup. `show` and `hide`
//! are idempotent, so the host sees at most one attach per visible overlay.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// What the overlay needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayView {
    pub count: u64,
    pub limit: u32,
    pub safe_url: String,
}

/// The two user actions wired into the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayAction {
    GoToSafePage,
    Dismiss,
}

/// Document-side operations the controller drives.
pub trait OverlayHost: Send {
    fn attach(&mut self, view: &OverlayView);

    fn detach(&mut self);

    fn navigate(&mut self, url: &str);
}

pub struct OverlayController {
    host: Box<dyn OverlayHost>,
    shown: Option<OverlayView>,
    safe_url: String,
}

impl OverlayController {
    pub fn new(host: Box<dyn OverlayHost>, safe_url: impl Into<String>) -> Self {
        Self {
            host,
            shown: None,
            safe_url: safe_url.into(),
        }
    }

    pub fn is_shown(&self) -> bool {
        self.shown.is_some()
    }

    pub fn view(&self) -> Option<&OverlayView> {
        self.shown.as_ref()
    }

    /// Attach the overlay. Returns `false` if it was already shown.
    pub fn show(&mut self, count: u64, limit: u32) -> bool {
        if self.shown.is_some() {
            return false;
        }
        let view = OverlayView {
            count,
            limit,
            safe_url: self.safe_url.clone(),
        };
        self.host.attach(&view);
        self.shown = Some(view);
        true
    }

    /// Remove the overlay. Returns `false` if nothing was shown.
    pub fn hide(&mut self) -> bool {
        if self.shown.take().is_none() {
            return false;
        }
        self.host.detach();
        true
    }

    pub fn go_to_safe_page(&mut self) -> String {
        self.host.navigate(&self.safe_url);
        self.safe_url.clone()
    }
}

/// What a [`RecordingOverlay`] has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayRecord {
    /// Overlays currently attached to the document.
    pub attached: usize,
    pub attach_calls: usize,
    pub last_view: Option<OverlayView>,
    pub navigations: Vec<String>,
}

/// Host that records calls instead of touching a document.
///
/// Clones share the same record, so a test can keep one and hand the other
/// to an agent.
#[derive(Debug, Clone, Default)]
pub struct RecordingOverlay {
    record: Arc<Mutex<OverlayRecord>>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> OverlayRecord {
        self.record.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut OverlayRecord)) {
        if let Ok(mut r) = self.record.lock() {
            f(&mut r);
        }
    }
}

impl OverlayHost for RecordingOverlay {
    fn attach(&mut self, view: &OverlayView) {
        self.update(|r| {
            r.attached += 1;
            r.attach_calls += 1;
            r.last_view = Some(view.clone());
        });
    }

    fn detach(&mut self) {
        self.update(|r| r.attached = r.attached.saturating_sub(1));
    }

    fn navigate(&mut self, url: &str) {
        self.update(|r| r.navigations.push(url.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (OverlayController, RecordingOverlay) {
        let host = RecordingOverlay::new();
        let ctl = OverlayController::new(Box::new(host.clone()), "https://www.youtube.com/");
        (ctl, host)
    }

    #[test]
    fn repeated_show_attaches_once() {
        let (mut ctl, host) = controller();
        assert!(ctl.show(5, 5));
        for _ in 0..10 {
            assert!(!ctl.show(6, 5));
        }
        let rec = host.record();
        assert_eq!(rec.attached, 1);
        assert_eq!(rec.attach_calls, 1);
        assert_eq!(rec.last_view.unwrap().count, 5);
    }

    #[test]
    fn hide_is_idempotent() {
        let (mut ctl, host) = controller();
        assert!(!ctl.hide());
        ctl.show(5, 5);
        assert!(ctl.hide());
        assert!(!ctl.hide());
        assert_eq!(host.record().attached, 0);
        assert!(!ctl.is_shown());
    }

    #[test]
    fn safe_page_navigates_host() {
        let (mut ctl, host) = controller();
        assert_eq!(ctl.go_to_safe_page(), "https://www.youtube.com/");
        assert_eq!(host.record().navigations, vec!["https://www.youtube.com/"]);
    }
}
