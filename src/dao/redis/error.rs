use thiserror::Error;

use crate::dao::storage::StorageError;

/// Result alias for the Redis layer.
pub type RedisResult<T> = Result<T, RedisDaoError>;

#[derive(Debug, Error)]
pub enum RedisDaoError {
    #[error("missing environment variable {var}")]
    MissingEnvVar { var: &'static str },
    #[error("invalid Redis URL `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: redis::RedisError,
    },
    #[error("failed to establish Redis connection")]
    Connect {
        #[source]
        source: redis::RedisError,
    },
    #[error("initial PING failed")]
    InitialPing {
        #[source]
        source: redis::RedisError,
    },
    #[error("{command} command failed")]
    Command {
        command: &'static str,
        #[source]
        source: redis::RedisError,
    },
}

impl From<RedisDaoError> for StorageError {
    fn from(err: RedisDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
