//! Redis-backed `UserRepository`: the whole [`UserAggregate`] stored
//! as one JSON blob under its bare `user_id` key, in the logical db
//! `Config::redis::user_db` selects — no other key ever lives there,
//! which is what makes `count()` exact. Every Redis call is routed
//! through `Error::from_redis` rather than the blanket `#[from]`
//! conversion, so a dropped connection surfaces as
//! `Error::BackingStoreTransient` and gets redelivered instead of
//! acked as a poison pill.

use async_trait::async_trait;
use feature_core::repository::UserRepository;
use feature_core::types::UserAggregate;
use feature_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// `count()` uses `DBSIZE` rather than `KEYS *`: exact, O(1), and
/// non-blocking, since this repository's connection is opened against
/// a db index that holds nothing but user aggregates (the stream and
/// tripwire state each get their own db — see `main.rs`).
#[derive(Clone)]
pub struct RedisUserRepository {
    conn: ConnectionManager,
}

impl RedisUserRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserRepository for RedisUserRepository {
    async fn get(&self, user_id: &str) -> Result<UserAggregate> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(user_id).await.map_err(Error::from_redis)?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(Error::UserNotFound(user_id.to_string())),
        }
    }

    async fn create(&self, user_id: &str) -> Result<UserAggregate> {
        let user = UserAggregate::new(user_id);
        self.save(&user).await?;
        Ok(user)
    }

    async fn save(&self, user: &UserAggregate) -> Result<()> {
        let json = serde_json::to_string(user)?;
        let mut conn = self.conn.clone();
        conn.set(&user.user_id, json).await.map_err(Error::from_redis)?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del(user_id).await.map_err(Error::from_redis)?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let n: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(Error::from_redis)?;
        Ok(n)
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
