//! Remaining-quota badge.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::storage::Settings;

/// Badge text for the given settings and count, or `None` for no badge.
///
/// Remaining quota is clamped to `0..=max_display` so an over-limit day
/// shows `0` rather than a negative number.
pub fn project(settings: &Settings, count_today: u64, max_display: u32) -> Option<String> {
    if !settings.badge_enabled {
        return None;
    }
    let remaining = i64::from(settings.max_shorts) - i64::try_from(count_today).unwrap_or(i64::MAX);
    Some(remaining.clamp(0, i64::from(max_display)).to_string())
}

/// Extension-wide indicator surface. Empty text removes the badge.
#[async_trait]
pub trait BadgeSurface: Send + Sync {
    async fn set_text(&self, text: &str);
}

/// Badge that keeps its text in memory.
#[derive(Debug, Default)]
pub struct MemoryBadge {
    text: Mutex<String>,
}

impl MemoryBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BadgeSurface for MemoryBadge {
    async fn set_text(&self, text: &str) {
        if let Ok(mut current) = self.text.lock() {
            *current = text.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max: u32, badge: bool) -> Settings {
        Settings {
            max_shorts: max,
            enabled: true,
            badge_enabled: badge,
        }
    }

    #[test]
    fn shows_remaining() {
        assert_eq!(project(&settings(5, true), 2, 999).as_deref(), Some("3"));
        assert_eq!(project(&settings(5, true), 5, 999).as_deref(), Some("0"));
    }

    #[test]
    fn clamps_to_displayable_range() {
        assert_eq!(project(&settings(5, true), 9, 999).as_deref(), Some("0"));
        assert_eq!(project(&settings(5000, true), 0, 999).as_deref(), Some("999"));
    }

    #[test]
    fn disabled_badge_is_absent_regardless_of_count() {
        for count in [0, 3, 5, 100] {
            assert!(project(&settings(5, false), count, 999).is_none());
        }
    }
}
