//! In-process store used by tests and the simulation host.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::counter::count_from_value;
use super::{Entries, Store};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
    unavailable: AtomicBool,
    failing_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Make every operation fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `n` writes fail with [`StoreError::QuotaExceeded`].
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Synchronous peek for assertions.
    pub fn snapshot(&self) -> Entries {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let remaining = self.failing_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::QuotaExceeded);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Entries, StoreError> {
        let entries = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, new_entries: Entries) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        self.check_write()?;
        entries.extend(new_entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        self.check_write()?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Entries, StoreError> {
        Ok(self.lock()?.clone())
    }

    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut entries = self.lock()?;
        self.check_write()?;
        let current = entries
            .get(key)
            .map(|v| count_from_value(key, v).unwrap_or(0))
            .unwrap_or(0);
        let next = current + 1;
        entries.insert(key.to_string(), Value::from(next));
        Ok(next)
    }
}
