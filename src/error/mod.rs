//! Error types for deve.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
