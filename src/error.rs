//! Error types for the finance insight agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Capability error: {0}")]
    CapabilityError(String),

    #[error("Invalid capability input: {0}")]
    InvalidCapabilityInput(String),

    #[error("Reasoning call error: {0}")]
    ReasoningError(String),

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
