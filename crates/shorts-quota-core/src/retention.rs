//! Retention sweep for stale daily counters.
//!
//! Counters dated strictly before `today - horizon_days` are removed; the
//! boundary day itself is kept. Comparison is by calendar date, so the
//! outcome does not depend on the time of day the sweep runs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::day_key::DayKey;
use crate::error::StoreError;
use crate::storage::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Keys carrying the day-key prefix.
    pub scanned: usize,
    pub removed: Vec<String>,
    /// Prefixed keys that did not parse as a date.
    pub skipped: Vec<String>,
}

/// Oldest date that survives a sweep run on `today`.
pub fn cutoff(today: NaiveDate, horizon_days: u32) -> NaiveDate {
    today
        .checked_sub_days(chrono::Days::new(u64::from(horizon_days)))
        .unwrap_or(NaiveDate::MIN)
}

pub async fn sweep(
    store: &dyn Store,
    today: NaiveDate,
    horizon_days: u32,
) -> Result<SweepReport, StoreError> {
    let keep_from = cutoff(today, horizon_days);
    let all = store.get_all().await?;

    let mut report = SweepReport::default();
    for key in all.keys().filter(|k| DayKey::is_day_key(k)) {
        report.scanned += 1;
        match key.parse::<DayKey>() {
            Ok(day) => {
                if day.date().is_some_and(|d| d < keep_from) {
                    report.removed.push(key.clone());
                }
            }
            Err(e) => {
                debug!(%key, error = %e, "skipping unparseable counter key");
                report.skipped.push(key.clone());
            }
        }
    }

    if !report.removed.is_empty() {
        let keys: Vec<&str> = report.removed.iter().map(String::as_str).collect();
        store.remove(&keys).await?;
    }
    info!(
        scanned = report.scanned,
        removed = report.removed.len(),
        skipped = report.skipped.len(),
        %keep_from,
        "retention sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Entries, MemoryStore};
    use serde_json::Value;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(d: NaiveDate) -> String {
        DayKey::from_date(d).to_string()
    }

    #[tokio::test]
    async fn boundary_day_is_kept() {
        let today = date(2026, 10, 19);
        let mut entries = Entries::new();
        for back in 0..=10u64 {
            let d = today - chrono::Days::new(back);
            entries.insert(key(d), Value::from(back));
        }
        entries.insert("maxShorts".into(), Value::from(5));
        let store = MemoryStore::with_entries(entries);

        let report = sweep(&store, today, 7).await.unwrap();

        assert_eq!(report.scanned, 11);
        let mut removed = report.removed.clone();
        removed.sort();
        let mut expected: Vec<String> = (8..=10u64)
            .map(|b| key(today - chrono::Days::new(b)))
            .collect();
        expected.sort();
        assert_eq!(removed, expected);

        let left = store.snapshot();
        assert!(left.contains_key(&key(date(2026, 10, 12))));
        assert!(!left.contains_key(&key(date(2026, 10, 11))));
        assert!(left.contains_key("maxShorts"));
    }

    #[tokio::test]
    async fn malformed_keys_are_skipped() {
        let store = MemoryStore::with_entries(Entries::from([
            ("shorts_2020_0_1".to_string(), Value::from(3)),
            ("shorts_bad".to_string(), Value::from(1)),
            ("shorts_2020_1_31".to_string(), Value::from(1)),
        ]));
        let report = sweep(&store, date(2026, 10, 19), 7).await.unwrap();
        assert_eq!(report.removed, vec!["shorts_2020_0_1".to_string()]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn crosses_month_and_year_boundaries() {
        let today = date(2026, 1, 3);
        let store = MemoryStore::with_entries(Entries::from([
            (key(date(2025, 12, 27)), Value::from(1)),
            (key(date(2025, 12, 26)), Value::from(1)),
        ]));
        let report = sweep(&store, today, 7).await.unwrap();
        assert_eq!(report.removed, vec![key(date(2025, 12, 26))]);
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_error() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(sweep(&store, date(2026, 10, 19), 7).await.is_err());
    }
}
