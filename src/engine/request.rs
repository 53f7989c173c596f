//! Engine request type.

use hyper::Method;
use serde::Serialize;

use crate::error::DeveError;

/// A single call against the engine API.
///
/// Built fresh for every call and consumed by the transport.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Short operation name used in logs and errors ("stop", "create", ...).
    pub operation: &'static str,
    pub method: Method,
    /// Path below the versioned API root, including any query string.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl EngineRequest {
    fn new(operation: &'static str, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::GET, path)
    }

    /// Create a POST request without a body.
    pub fn post(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::POST, path)
    }

    /// Create a DELETE request.
    pub fn delete(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, DeveError> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Full request URI. The authority is a placeholder; the socket does the addressing.
    pub fn uri(&self, api_version: &str) -> String {
        format!("http://localhost/{}{}", api_version, self.path)
    }
}
