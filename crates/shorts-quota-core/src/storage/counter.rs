//! Daily counter access on top of a [`Store`].

use serde_json::Value;
use tracing::{info, warn};

use super::{Entries, Store};
use crate::day_key::DayKey;
use crate::error::{ParseError, StoreError};

/// Interpret a stored counter value.
///
/// The extension wrote plain numbers, but older popups round-tripped the
/// value through strings, so numeric strings are accepted too.
pub fn count_from_value(key: &str, value: &Value) -> Result<u64, ParseError> {
    let unexpected = || ParseError::UnexpectedValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(unexpected),
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| unexpected()),
        Value::Null => Ok(0),
        _ => Err(unexpected()),
    }
}

/// Views recorded for `day`. Missing counters read as zero.
pub async fn read(store: &dyn Store, day: DayKey) -> Result<u64, StoreError> {
    let key = day.to_string();
    let entries = store.get(&[key.as_str()]).await?;
    Ok(match entries.get(&key) {
        Some(value) => count_from_value(&key, value).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring malformed counter value");
            0
        }),
        None => 0,
    })
}

/// Record one more view for `day` and return the new total.
pub async fn increment(store: &dyn Store, day: DayKey) -> Result<u64, StoreError> {
    let key = day.to_string();
    let count = store.increment(&key).await?;
    info!(%key, count, "counter incremented");
    Ok(count)
}

/// Drop the counter for `day` entirely.
pub async fn reset(store: &dyn Store, day: DayKey) -> Result<(), StoreError> {
    let key = day.to_string();
    store.remove(&[key.as_str()]).await?;
    info!(%key, "counter reset");
    Ok(())
}

/// Every parseable day counter in the store, newest first.
///
/// Keys that carry the prefix but fail to parse are skipped.
pub async fn history(store: &dyn Store) -> Result<Vec<(DayKey, u64)>, StoreError> {
    let all: Entries = store.get_all().await?;
    let mut days: Vec<(DayKey, u64)> = all
        .iter()
        .filter(|(key, _)| DayKey::is_day_key(key))
        .filter_map(|(key, value)| {
            let day = key.parse::<DayKey>().ok()?;
            let count = count_from_value(key, value).ok()?;
            Some((day, count))
        })
        .collect();
    days.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(days)
}
