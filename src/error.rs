//! Error types for the briefing engine.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid keyword pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Briefing pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Item fetch failed: {0}")]
    Fetch(String),

    #[error("Clustering failed: {0}")]
    Cluster(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// External reasoner errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Reasoner request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid response from reasoner: {reason}")]
    InvalidResponse { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Session state machine errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A turn is already in progress for this session")]
    TurnInProgress,

    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
