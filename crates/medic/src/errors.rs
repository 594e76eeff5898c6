//! Error types for the remediation engine.

use thiserror::Error;

/// Errors surfaced by the remediation engine.
///
/// The taxonomy mirrors how failures propagate: validation and storage
/// errors are fatal to the operation in progress; AI-service and parse
/// errors abort the investigation and mark the session failed; individual
/// diagnostic-tool and command failures are recorded per-item and
/// aggregated into the result instead of propagating.
#[derive(Debug, Error)]
pub enum MedicError {
    // Request errors
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    // Session errors
    #[error("Session '{session_id}' not found")]
    SessionNotFound { session_id: String },

    #[error("Session '{session_id}' already exists")]
    SessionExists { session_id: String },

    #[error("Invalid status transition for session '{session_id}': {from} -> {to}")]
    InvalidTransition {
        session_id: String,
        from: String,
        to: String,
    },

    // Storage errors
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("Failed to read '{path}': {reason}")]
    FileRead { path: String, reason: String },

    #[error("Failed to write '{path}': {reason}")]
    FileWrite { path: String, reason: String },

    #[error("Failed to parse JSON: {reason}")]
    JsonParse { reason: String },

    // AI errors
    #[error("AI service error: {reason}")]
    AiService { reason: String },

    #[error("Analysis response invalid: {reason}")]
    ResponseParse { reason: String },

    // Operation errors (recorded per-item, never fatal to a batch)
    #[error("Diagnostic tool failed: {reason}")]
    Diagnostic { reason: String },

    // Configuration errors
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // General errors
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl From<std::io::Error> for MedicError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MedicError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type MedicResult<T> = Result<T, MedicError>;
