//! Configuration management for the feature-restriction service.

use crate::{Error, Result};
use std::env;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisConfig,
    pub stream: StreamConfig,
    pub tripwire: TripwireConfig,
    pub server: ServerConfig,
}

/// Connection coordinates for the three Redis logical databases this
/// service uses. User data, the stream, and tripwire state each live
/// in their own db index so a db-scoped operation like `DBSIZE` (used
/// by `RedisUserRepository::count`) counts only what it's supposed
/// to — mirroring `REDIS_DB_USER`/`REDIS_DB_STREAM`/`REDIS_DB_TRIPWIRE`
/// in the original Python service, which opened one connection per db
/// for the same reason.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Base connection URL, with no database segment — each store
    /// connects to its own db via [`RedisConfig::db_url`].
    pub url: String,
    pub user_db: u8,
    pub stream_db: u8,
    pub tripwire_db: u8,
}

impl RedisConfig {
    /// `url` with `db` appended as the logical database segment, e.g.
    /// `redis://127.0.0.1:6379/2`.
    pub fn db_url(&self, db: u8) -> String {
        format!("{}/{db}", self.url.trim_end_matches('/'))
    }
}

/// Names of the durable log stream and the consumer group/name that
/// reads it.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub stream_key: String,
    pub consumer_group: String,
    pub consumer_name: String,
    /// Max entries per `XREADGROUP` call.
    pub read_count: usize,
    /// Blocking-read timeout in milliseconds.
    pub block_ms: usize,
}

/// Sliding-window tripwire parameters (`W = 300s`, `T = 0.05` by
/// default).
#[derive(Debug, Clone)]
pub struct TripwireConfig {
    pub window_secs: i64,
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_key: "event_stream".to_string(),
            consumer_group: "group1".to_string(),
            consumer_name: "consumer1".to_string(),
            read_count: 10,
            block_ms: 1000,
        }
    }
}

impl Default for TripwireConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            threshold: 0.05,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// each field's documented default for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let stream = StreamConfig {
            stream_key: env::var("EVENT_STREAM_KEY")
                .unwrap_or_else(|_| StreamConfig::default().stream_key),
            consumer_group: env::var("CONSUMER_GROUP")
                .unwrap_or_else(|_| StreamConfig::default().consumer_group),
            consumer_name: env::var("CONSUMER_NAME")
                .unwrap_or_else(|_| StreamConfig::default().consumer_name),
            read_count: env::var("STREAM_READ_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| StreamConfig::default().read_count),
            block_ms: env::var("STREAM_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| StreamConfig::default().block_ms),
        };

        let tripwire = TripwireConfig {
            window_secs: env::var("TRIPWIRE_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| TripwireConfig::default().window_secs),
            threshold: env::var("TRIPWIRE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| TripwireConfig::default().threshold),
        };

        if tripwire.window_secs <= 0 {
            return Err(Error::Config(format!(
                "TRIPWIRE_WINDOW_SECS must be positive, got {}",
                tripwire.window_secs
            )));
        }
        if !(0.0..=1.0).contains(&tripwire.threshold) {
            return Err(Error::Config(format!(
                "TRIPWIRE_THRESHOLD must be within [0, 1], got {}",
                tripwire.threshold
            )));
        }

        Ok(Self {
            redis: RedisConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                user_db: env::var("REDIS_DB_USER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                stream_db: env::var("REDIS_DB_STREAM")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
                tripwire_db: env::var("REDIS_DB_TRIPWIRE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            stream,
            tripwire,
            server: ServerConfig {
                bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            },
        })
    }

    /// Configuration for testing, with defaults and no dependency on
    /// environment variables.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                user_db: 0,
                stream_db: 1,
                tripwire_db: 2,
            },
            stream: StreamConfig::default(),
            tripwire: TripwireConfig::default(),
            server: ServerConfig {
                bind_addr: "127.0.0.1:0".to_string(),
            },
        }
    }
}
