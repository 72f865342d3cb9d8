//! Redis-backed `TripwireRepository`. `tripwire:states` is a hash of
//! rule_name -> "1"/"0", and `tripwire:affected_users:{rule_name}` is
//! a hash of user_id -> unix timestamp. Calls are mapped through
//! `Error::from_redis` so a connection drop is `BackingStoreTransient`,
//! not a poison pill.

use async_trait::async_trait;
use feature_core::{Error, Result};
use feature_tripwire::TripwireRepository;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

const STATES_KEY: &str = "tripwire:states";
const AFFECTED_PREFIX: &str = "tripwire:affected_users:";

fn affected_key(rule_name: &str) -> String {
    format!("{AFFECTED_PREFIX}{rule_name}")
}

#[derive(Clone)]
pub struct RedisTripwireRepository {
    conn: ConnectionManager,
}

impl RedisTripwireRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TripwireRepository for RedisTripwireRepository {
    async fn expired_users(&self, rule_name: &str, cutoff: i64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let all: HashMap<String, i64> = conn
            .hgetall(affected_key(rule_name))
            .await
            .map_err(Error::from_redis)?;
        Ok(all
            .into_iter()
            .filter(|(_, ts)| *ts <= cutoff)
            .map(|(uid, _)| uid)
            .collect())
    }

    async fn remove_affected(&self, rule_name: &str, user_ids: &[String]) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.hdel(affected_key(rule_name), user_ids)
            .await
            .map_err(Error::from_redis)?;
        Ok(())
    }

    async fn set_affected(&self, rule_name: &str, user_id: &str, timestamp: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hset(affected_key(rule_name), user_id, timestamp)
            .await
            .map_err(Error::from_redis)?;
        Ok(())
    }

    async fn affected_count(&self, rule_name: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let n: u64 = conn
            .hlen(affected_key(rule_name))
            .await
            .map_err(Error::from_redis)?;
        Ok(n)
    }

    async fn set_disabled(&self, rule_name: &str, disabled: bool) -> Result<()> {
        let mut conn = self.conn.clone();
        let value = if disabled { "1" } else { "0" };
        conn.hset(STATES_KEY, rule_name, value)
            .await
            .map_err(Error::from_redis)?;
        Ok(())
    }

    async fn all_disabled(&self) -> Result<HashMap<String, bool>> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn
            .hgetall(STATES_KEY)
            .await
            .map_err(Error::from_redis)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v == "1")).collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(Error::from_redis)?;
        Ok(())
    }
}
