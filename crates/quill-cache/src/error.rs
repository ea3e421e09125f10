//! Error types for cache operations.

use deadpool_redis::redis::RedisError;
use deadpool_redis::{CreatePoolError, PoolError};
use thiserror::Error;

/// Convenience alias for cache results.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The Redis connection pool could not be created.
    #[error("failed to create cache connection pool")]
    CreatePool {
        /// Source pool construction error.
        source: CreatePoolError,
    },
    /// No pooled connection could be obtained.
    #[error("cache connection unavailable")]
    Pool {
        /// Operation identifier.
        operation: &'static str,
        /// Source pool error.
        source: PoolError,
    },
    /// A Redis command failed.
    #[error("cache command failed")]
    Command {
        /// Operation identifier.
        operation: &'static str,
        /// Cache key involved in the command.
        key: String,
        /// Source Redis error.
        source: RedisError,
    },
    /// A value could not be encoded for storage.
    #[error("failed to encode cached value")]
    Encode {
        /// Cache key being written.
        key: String,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// A stored value could not be decoded.
    #[error("failed to decode cached value")]
    Decode {
        /// Cache key being read.
        key: String,
        /// Source serde error.
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Cache key associated with the failure, when one applies.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Command { key, .. } | Self::Encode { key, .. } | Self::Decode { key, .. } => {
                Some(key)
            }
            Self::CreatePool { .. } | Self::Pool { .. } => None,
        }
    }
}
