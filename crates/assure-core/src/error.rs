use thiserror::Error;

/// Top-level error type shared by every crate above `assure-core`.
///
/// `.code()` gives a stable string used verbatim in HTTP error bodies —
/// clients should match on the code, not the Display text.
#[derive(Debug, Error)]
pub enum AssureError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("lock contention: {key}")]
    LockTimeout { key: String },

    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session not found: {id}")]
    SessionNotFound { id: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AssureError {
    pub fn code(&self) -> &'static str {
        match self {
            AssureError::Config(_) => "CONFIG_ERROR",
            AssureError::Database(_) => "DATABASE_ERROR",
            AssureError::Cache(_) => "CACHE_ERROR",
            AssureError::LockTimeout { .. } => "LOCK_TIMEOUT",
            AssureError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            AssureError::Retrieval(_) => "RETRIEVAL_ERROR",
            AssureError::Validation(_) => "VALIDATION_ERROR",
            AssureError::Serialization(_) => "SERIALIZATION_ERROR",
            AssureError::Io(_) => "IO_ERROR",
            AssureError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            AssureError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error reflects transient infrastructure trouble (durable
    /// store, cache, vector store, LLM) as opposed to a client mistake.
    pub fn is_transient_infra(&self) -> bool {
        matches!(
            self,
            AssureError::Database(_)
                | AssureError::Cache(_)
                | AssureError::LlmProvider(_)
                | AssureError::Retrieval(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AssureError>;
