//! Redis-backed storage: one implementation per trait defined in
//! `feature-core` and `feature-tripwire`, keyed per the layout
//! documented on each repository's trait.

pub mod event_log;
pub mod tripwire_repository;
pub mod user_repository;

pub use event_log::RedisEventLog;
pub use tripwire_repository::RedisTripwireRepository;
pub use user_repository::RedisUserRepository;

use feature_core::{Error, Result};
use redis::aio::ConnectionManager;

/// Open a connection manager against `url`, mapping connection
/// failures to [`Error::Fatal`] — callers use this only at startup,
/// where there's no sensible retry target yet.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(url).map_err(|e| Error::Fatal(e.to_string()))?;
    client
        .get_connection_manager()
        .await
        .map_err(|e| Error::Fatal(e.to_string()))
}
