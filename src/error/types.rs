//! Error types for deve.

use thiserror::Error;

/// Main error type for deve.
#[derive(Error, Debug)]
pub enum DeveError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Container engine errors.
    #[error("Engine error: {kind}")]
    Engine { kind: EngineErrorKind },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Container engine error kinds.
#[derive(Error, Debug)]
pub enum EngineErrorKind {
    /// The socket could not be reached or the connection broke mid-request.
    #[error("engine unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    /// The engine answered, but the body did not match the expected shape.
    #[error("malformed engine response to {operation}: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} of {target} returned unexpected status {status}")]
    UnexpectedStatus {
        operation: &'static str,
        target: String,
        status: u16,
    },
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

impl DeveError {
    /// Build an `Unavailable` engine error.
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        DeveError::Engine {
            kind: EngineErrorKind::Unavailable {
                operation,
                message: message.into(),
            },
        }
    }

    /// Build a `MalformedResponse` engine error.
    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        DeveError::Engine {
            kind: EngineErrorKind::MalformedResponse {
                operation,
                message: message.into(),
            },
        }
    }

    /// Build an `UnexpectedStatus` engine error.
    pub fn unexpected_status(operation: &'static str, target: impl Into<String>, status: u16) -> Self {
        DeveError::Engine {
            kind: EngineErrorKind::UnexpectedStatus {
                operation,
                target: target.into(),
                status,
            },
        }
    }

    /// Whether the engine could not be reached or spoke garbage.
    ///
    /// Malformed bodies count as unavailable: the caller cannot tell what
    /// the engine did.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(
            self,
            DeveError::Engine {
                kind: EngineErrorKind::Unavailable { .. } | EngineErrorKind::MalformedResponse { .. }
            }
        )
    }

    /// The status code carried by an `UnexpectedStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeveError::Engine {
                kind: EngineErrorKind::UnexpectedStatus { status, .. },
            } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for deve operations.
pub type DeveResult<T> = Result<T, DeveError>;
