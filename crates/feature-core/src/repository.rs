//! Storage traits that decouple the core pipeline from its backing
//! stores. A Redis-backed implementation of each trait lives in
//! `feature-redis`; the in-memory implementations here back unit and
//! integration tests without a live Redis dependency.

use crate::error::Error;
use crate::types::UserAggregate;
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Read/write access to per-user aggregate state.
///
/// `count()` need not be strongly consistent with concurrent writes —
/// eventual, best-effort is acceptable, since it only feeds the
/// tripwire's affected-fraction check.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<UserAggregate>;
    async fn create(&self, user_id: &str) -> Result<UserAggregate>;
    async fn save(&self, user: &UserAggregate) -> Result<()>;
    async fn delete(&self, user_id: &str) -> Result<()>;
    async fn count(&self) -> Result<u64>;
    async fn clear(&self) -> Result<()>;
}

/// `DashMap`-backed `UserRepository`, used by tests and by a
/// `--no-redis` local run mode.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: DashMap<String, UserAggregate>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, user_id: &str) -> Result<UserAggregate> {
        self.users
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }

    async fn create(&self, user_id: &str) -> Result<UserAggregate> {
        let user = UserAggregate::new(user_id);
        self.users.insert(user_id.to_string(), user.clone());
        Ok(user)
    }

    async fn save(&self, user: &UserAggregate) -> Result<()> {
        self.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.users.remove(user_id);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.users.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.users.clear();
        Ok(())
    }
}

/// A single log entry as delivered to a consumer: an opaque ordered
/// id plus the event's name and serialized properties.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: String,
    pub name: String,
    pub event_properties_json: String,
}

/// An append-only log with consumer-group semantics.
/// `ensure_group` must tolerate "group already exists" as a no-op and
/// propagate anything else as `Error::Fatal`.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, name: &str, event_properties: &Map<String, Value>) -> Result<String>;
    async fn ensure_group(&self) -> Result<()>;
    async fn read_group(&self, count: usize, block_ms: usize) -> Result<Vec<LogEntry>>;
    async fn ack(&self, id: &str) -> Result<()>;
}

/// In-process, single-partition stand-in for a Redis stream + consumer
/// group, sufficient to exercise `StreamConsumer` in tests without a
/// live Redis instance. Delivery order matches append order; pending
/// (unacknowledged) entries are redelivered on the next read, mirroring
/// at-least-once semantics.
pub struct InMemoryEventLog {
    next_id: AtomicU64,
    entries: Mutex<Vec<LogEntry>>,
    /// Index into `entries` of the next entry this consumer hasn't
    /// yet delivered.
    cursor: AtomicU64,
    pending: Mutex<Vec<LogEntry>>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
            cursor: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, name: &str, event_properties: &Map<String, Value>) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event_properties_json = serde_json::to_string(event_properties)?;
        self.entries.lock().unwrap().push(LogEntry {
            id: id.to_string(),
            name: name.to_string(),
            event_properties_json,
        });
        Ok(id.to_string())
    }

    async fn ensure_group(&self) -> Result<()> {
        Ok(())
    }

    async fn read_group(&self, count: usize, _block_ms: usize) -> Result<Vec<LogEntry>> {
        // Redeliver anything still pending first, so a test that never
        // acks sees the same entries again — matching Redis's
        // consumer-group redelivery behavior.
        let pending = self.pending.lock().unwrap();
        if !pending.is_empty() {
            return Ok(pending.iter().take(count).cloned().collect());
        }
        drop(pending);

        let entries = self.entries.lock().unwrap();
        let start = self.cursor.load(Ordering::SeqCst) as usize;
        let batch: Vec<LogEntry> = entries.iter().skip(start).take(count).cloned().collect();
        self.cursor
            .store((start + batch.len()) as u64, Ordering::SeqCst);
        *self.pending.lock().unwrap() = batch.clone();
        Ok(batch)
    }

    async fn ack(&self, id: &str) -> Result<()> {
        self.pending.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_user_repository_lazy_create() {
        let repo = InMemoryUserRepository::new();
        assert!(repo.get("u1").await.is_err());
        let user = repo.create("u1").await.unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_event_log_redelivers_until_acked() {
        let log = InMemoryEventLog::new();
        let mut props = Map::new();
        props.insert("user_id".to_string(), json!("u1"));
        let id = log.append("scam_message_flagged", &props).await.unwrap();

        let batch = log.read_group(10, 100).await.unwrap();
        assert_eq!(batch.len(), 1);

        // Without an ack, the same entry is redelivered.
        let batch_again = log.read_group(10, 100).await.unwrap();
        assert_eq!(batch_again.len(), 1);
        assert_eq!(batch_again[0].id, id);

        log.ack(&id).await.unwrap();
        let batch_after_ack = log.read_group(10, 100).await.unwrap();
        assert!(batch_after_ack.is_empty());
    }
}
