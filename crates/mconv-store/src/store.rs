//! Status store contract and backend selection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use mconv_models::{TaskId, TaskRecord};

use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::redis_store::RedisStore;

/// Time-to-live applied to every status write.
pub const DEFAULT_TASK_TTL: Duration = Duration::from_secs(30 * 60);

/// How long startup waits for Redis before falling back to memory.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Key/value store of task records with per-record expiry.
///
/// Each task id has a single writer (its background job). The store only
/// has to be safe for concurrent access across different ids.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Upsert a record and reset its TTL.
    async fn set(&self, record: &TaskRecord, ttl: Duration) -> StoreResult<()>;

    /// Latest record, or `None` when unknown or expired.
    async fn get(&self, id: &TaskId) -> Option<TaskRecord>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Store handle shared by the API and every job.
pub type SharedStatusStore = Arc<dyn StatusStore>;

/// Pick the status backend for this process.
///
/// With a Redis URL, the server must answer `PING` within a short timeout;
/// otherwise the in-process store is used for the rest of the process
/// lifetime. Callers cannot tell the backends apart.
pub async fn connect_status_store(redis_url: Option<&str>) -> SharedStatusStore {
    let Some(url) = redis_url.map(str::trim).filter(|u| !u.is_empty()) else {
        info!("No Redis URL configured, using in-memory status store");
        return Arc::new(MemoryStore::new());
    };

    match tokio::time::timeout(CONNECT_TIMEOUT, RedisStore::connect(url)).await {
        Ok(Ok(store)) => {
            info!("Using Redis status store");
            Arc::new(store)
        }
        Ok(Err(e)) => {
            warn!("Redis ping failed: {} (fallback to memory)", e);
            Arc::new(MemoryStore::new())
        }
        Err(_) => {
            warn!(
                "Redis did not answer within {}s (fallback to memory)",
                CONNECT_TIMEOUT.as_secs()
            );
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mconv_models::Stage;

    #[tokio::test]
    async fn test_no_url_uses_memory() {
        let store = connect_status_store(None).await;
        assert_eq!(store.backend(), "memory");

        let store = connect_status_store(Some("  ")).await;
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_memory() {
        let store = connect_status_store(Some("redis://127.0.0.1:1/")).await;
        assert_eq!(store.backend(), "memory");

        let id = TaskId::new();
        let record = TaskRecord::processing(id.clone(), Stage::Download, 12);
        store.set(&record, DEFAULT_TASK_TTL).await.unwrap();
        assert_eq!(store.get(&id).await, Some(record));
    }

    #[tokio::test]
    async fn test_invalid_url_falls_back_to_memory() {
        let store = connect_status_store(Some("not-a-redis-url")).await;
        assert_eq!(store.backend(), "memory");
    }
}
