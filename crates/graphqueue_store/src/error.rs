use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job {0} not found")]
    JobNotFound(i64),

    #[error("prompt {0} not found")]
    PromptNotFound(i64),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
