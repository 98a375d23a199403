use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    ConnectionError(String),

    #[error("cache command failed: {0}")]
    CommandError(String),

    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "cache")]
impl From<bb8_redis::redis::RedisError> for CacheError {
    fn from(error: bb8_redis::redis::RedisError) -> Self {
        CacheError::CommandError(error.to_string())
    }
}

#[cfg(feature = "cache")]
impl From<bb8::RunError<bb8_redis::redis::RedisError>> for CacheError {
    fn from(error: bb8::RunError<bb8_redis::redis::RedisError>) -> Self {
        CacheError::ConnectionError(error.to_string())
    }
}
