//! Redis-backed status store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use mconv_models::{TaskId, TaskRecord};

use crate::error::StoreResult;
use crate::store::StatusStore;

/// Task records as JSON under `task:<id>`, expired by Redis itself.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { conn })
    }

    /// Key a task record is stored under.
    pub fn key(id: &TaskId) -> String {
        format!("task:{}", id)
    }
}

#[async_trait]
impl StatusStore for RedisStore {
    async fn set(&self, record: &TaskRecord, ttl: Duration) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        // SET EX rejects zero, so sub-second TTLs round up.
        conn.set_ex::<_, _, ()>(Self::key(&record.id), payload, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = match conn.get::<_, Option<String>>(Self::key(id)).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(task_id = %id, "Failed to read task status: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&payload?) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(task_id = %id, "Undecodable task status: {}", e);
                None
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mconv_models::Stage;

    #[test]
    fn test_key_format() {
        assert_eq!(RedisStore::key(&TaskId::from_string("abc")), "task:abc");
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_round_trip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let store = RedisStore::connect(&url).await.expect("Failed to connect to Redis");

        let id = TaskId::new();
        let record = TaskRecord::processing(id.clone(), Stage::Transcode, 77);
        store.set(&record, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&id).await, Some(record));

        store
            .set(&TaskRecord::pending(id.clone()), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get(&id).await, None);
    }
}
