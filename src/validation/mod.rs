//! Input validation module.
//!
//! Provides validators for the values that reach the certificate tool's
//! command line: the target domain and the contact email.

mod domain;
mod email;

pub use domain::validate_domain;
pub use email::validate_email;

use crate::error::{DeveError, ValidationErrorKind};

fn invalid(param: &str, message: impl Into<String>) -> DeveError {
    DeveError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: param.to_string(),
            message: message.into(),
        },
    }
}
