//! Redis Streams-backed `EventLog`: `XADD` to append, a consumer group
//! for `XREADGROUP`/`XACK`. Uses the low-level `cmd()` API since the
//! `redis` crate's typed stream helpers don't expose `XGROUP CREATE
//! MKSTREAM` or the `>`/`0` id sentinels `XREADGROUP` needs. `append`
//! and `ack` route their errors through `Error::from_redis`, same as
//! the other two repositories; `read_group` already treats every
//! failure as transient (a blocked read timing out looks identical to
//! a dropped connection from the caller's side), and `ensure_group`
//! keeps its own three-way classification since `BUSYGROUP` must stay
//! a no-op rather than an error at all.

use async_trait::async_trait;
use feature_core::repository::{EventLog, LogEntry};
use feature_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::{ErrorKind, RedisError, Value};
use serde_json::{Map, Value as JsonValue};

pub struct RedisEventLog {
    conn: ConnectionManager,
    stream_key: String,
    consumer_group: String,
    consumer_name: String,
}

impl RedisEventLog {
    pub fn new(
        conn: ConnectionManager,
        stream_key: impl Into<String>,
        consumer_group: impl Into<String>,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            stream_key: stream_key.into(),
            consumer_group: consumer_group.into(),
            consumer_name: consumer_name.into(),
        }
    }

    fn parse_stream_reply(reply: Value) -> Vec<LogEntry> {
        // XREADGROUP reply shape: [[stream_key, [[id, [field, value, ...]], ...]]]
        let mut out = Vec::new();
        let Value::Array(streams) = reply else {
            return out;
        };
        for stream in streams {
            let Value::Array(stream_pair) = stream else {
                continue;
            };
            let Some(Value::Array(entries)) = stream_pair.into_iter().nth(1) else {
                continue;
            };
            for entry in entries {
                let Value::Array(entry_pair) = entry else {
                    continue;
                };
                let mut it = entry_pair.into_iter();
                let Some(Value::BulkString(id_bytes)) = it.next() else {
                    continue;
                };
                let id = String::from_utf8_lossy(&id_bytes).to_string();
                let Some(Value::Array(fields)) = it.next() else {
                    continue;
                };
                let mut name = String::new();
                let mut event_properties_json = String::new();
                let mut chunks = fields.into_iter();
                while let (Some(field), Some(value)) = (chunks.next(), chunks.next()) {
                    let (Value::BulkString(field), Value::BulkString(value)) = (field, value)
                    else {
                        continue;
                    };
                    match field.as_slice() {
                        b"name" => name = String::from_utf8_lossy(&value).to_string(),
                        b"event_properties" => {
                            event_properties_json = String::from_utf8_lossy(&value).to_string()
                        }
                        _ => {}
                    }
                }
                out.push(LogEntry {
                    id,
                    name,
                    event_properties_json,
                });
            }
        }
        out
    }
}

/// Redis reports `BUSYGROUP` when the group already exists; every
/// other error on `XGROUP CREATE` is treated as fatal.
fn is_busygroup(err: &RedisError) -> bool {
    err.code() == Some("BUSYGROUP")
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn append(&self, name: &str, event_properties: &Map<String, JsonValue>) -> Result<String> {
        let mut conn = self.conn.clone();
        let event_properties_json = serde_json::to_string(event_properties)?;
        let id: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg("name")
            .arg(name)
            .arg("event_properties")
            .arg(event_properties_json)
            .query_async(&mut conn)
            .await
            .map_err(Error::from_redis)?;
        Ok(id)
    }

    async fn ensure_group(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: std::result::Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(&self.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_busygroup(&e) => Ok(()),
            Err(e) if e.kind() == ErrorKind::IoError => {
                Err(Error::BackingStoreTransient(e.to_string()))
            }
            Err(e) => Err(Error::Fatal(e.to_string())),
        }
    }

    async fn read_group(&self, count: usize, block_ms: usize) -> Result<Vec<LogEntry>> {
        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackingStoreTransient(e.to_string()))?;

        Ok(Self::parse_stream_reply(reply))
    }

    async fn ack(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(&self.consumer_group)
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(Error::from_redis)?;
        Ok(())
    }
}
