//! Engine response type.

use bytes::Bytes;
use hyper::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::DeveError;

/// Raw answer from the engine. The body is decoded on demand.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub operation: &'static str,
    pub status: StatusCode,
    pub body: Bytes,
}

/// Error body the engine sends with 4xx/5xx answers.
#[derive(Debug, Deserialize)]
struct EngineMessage {
    message: String,
}

impl EngineResponse {
    pub fn new(operation: &'static str, status: StatusCode, body: Bytes) -> Self {
        Self {
            operation,
            status,
            body,
        }
    }

    /// Numeric status code.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Decode the body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DeveError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| DeveError::malformed(self.operation, e.to_string()))
    }

    /// The engine's error message, when the body carries one.
    pub fn engine_message(&self) -> Option<String> {
        serde_json::from_slice::<EngineMessage>(&self.body)
            .ok()
            .map(|m| m.message)
    }

    /// Fail with `UnexpectedStatus` unless the status is `expected`.
    pub fn expect_status(self, expected: StatusCode, target: &str) -> Result<Self, DeveError> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(DeveError::unexpected_status(
                self.operation,
                target,
                self.status_code(),
            ))
        }
    }
}

/// Whether a start/stop/restart status means the container is where we asked.
///
/// 204 is a completed transition, 304 means it was already there.
pub fn is_action_success(status: u16) -> bool {
    status == StatusCode::NO_CONTENT.as_u16() || status == StatusCode::NOT_MODIFIED.as_u16()
}
