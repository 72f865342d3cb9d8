//! Error types for the feature-restriction service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Event rejected before it ever reached the log: missing `name`,
    /// missing/invalid `user_id`, empty `event_properties`, or an
    /// unrecognized event name.
    #[error("bad event: {0}")]
    BadEvent(String),

    /// A handler ran but a required property was absent from
    /// `event_properties`. Terminal for the entry: logged and
    /// acknowledged, never redelivered.
    #[error("bad event properties for '{event}': {reason}")]
    BadEventProperties { event: String, reason: String },

    /// A consumer read an entry whose `name` has no registered handler.
    #[error("unknown event name: {0}")]
    UnknownEventName(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Network/connection failure against the backing store. Entries
    /// that fail with this kind are NOT acknowledged, so the log
    /// redelivers them.
    #[error("backing store unavailable: {0}")]
    BackingStoreTransient(String),

    /// Startup-time failure with no viable recovery (e.g. the consumer
    /// group could not be created for a reason other than "already
    /// exists").
    #[error("fatal startup error: {0}")]
    Fatal(String),
}

impl Error {
    /// Classify a Redis client error for the repositories: a dropped
    /// connection or I/O failure is transient and must surface as
    /// [`Error::BackingStoreTransient`] so the consumer leaves the
    /// entry pending for redelivery instead of acking it as a poison
    /// pill; anything else (a malformed command, a type mismatch in
    /// the reply) becomes [`Error::Redis`].
    pub fn from_redis(err: redis::RedisError) -> Error {
        if err.kind() == redis::ErrorKind::IoError {
            Error::BackingStoreTransient(err.to_string())
        } else {
            Error::Redis(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
