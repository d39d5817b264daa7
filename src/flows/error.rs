use thiserror::Error;

/// Durable store failure. Always surfaced to the caller, never retried here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Cache failure. Logged and swallowed by the engine.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("block cache command failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("block cache payload invalid: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("unknown flow: {0}")]
    UnknownFlow(String),
    #[error("{flow} flow is blocked: {reason}")]
    Blocked { flow: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for FlowError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}
