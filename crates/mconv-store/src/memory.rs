//! In-process status store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use mconv_models::{TaskId, TaskRecord};

use crate::error::StoreResult;
use crate::store::StatusStore;

#[derive(Debug, Clone)]
struct Entry {
    record: TaskRecord,
    expires_at: Instant,
}

/// Mutex-guarded map of task records, scoped to the store instance.
///
/// Expired records are reclaimed on every write, so ids nobody polls do not
/// accumulate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<TaskId, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn set(&self, record: &TaskRecord, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let entry = Entry {
            record: record.clone(),
            expires_at: now + ttl,
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(record.id.clone(), entry);
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.record.clone()),
            Some(_) => {
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
