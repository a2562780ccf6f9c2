use thiserror::Error;

/// Errors raised anywhere in the recommendation flow.
#[derive(Error, Debug)]
pub enum MosesError {
    /// The completion call never produced a response (connect, timeout, body read).
    #[error("Network error: {0}")]
    Network(String),

    /// The completion API answered, but not with something usable.
    #[error("Upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create Redis pool: {0}")]
    PoolCreation(String),

    #[error("Profile backend error: {0}")]
    Backend(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MosesError {
    /// True for failures of the local key-value store, whichever backend raised them.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Redis(_) | Self::Pool(_) | Self::PoolCreation(_)
        )
    }

    /// True for failures of the completion call that the caller should surface.
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Upstream { .. })
    }
}

pub type Result<T> = std::result::Result<T, MosesError>;
