//! Error types for the advisory orchestration engine

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// Reasoning step exhausted its retry budget or failed non-transiently.
    #[error("Provider failure: {0}")]
    ProviderFailure(String),

    /// Transient provider error (timeout, rate limit, 5xx). Retried
    /// internally by the reasoning step; never crosses the public boundary.
    #[error("Transient provider error: {0}")]
    ProviderTransient(String),

    /// A single tool call failed. Recorded as an error-tagged result on the
    /// conversation; never aborts the session.
    #[error("Tool execution error: {0}")]
    ToolExecutionError(String),

    /// Invalid session parameters or unknown/malformed tool arguments.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Iteration cap reached before the session routed to finalize.
    #[error("Loop limit exceeded: {0}")]
    LoopLimitExceeded(String),

    /// Persistence layer cannot read or write a checkpoint record.
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// Caller-requested cancellation, observed at a transition boundary.
    #[error("Session cancelled: {0}")]
    Cancelled(String),

    /// Resumed a checkpoint whose session already reached `Failed`.
    #[error("Session previously failed: {0}")]
    SessionFailed(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Whether the reasoning step may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrchestrationError::ProviderTransient(_))
    }
}
