//! Validated issuance request.

use crate::error::DeveError;
use crate::validation::{validate_domain, validate_email};

/// The three external inputs of an issuance run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    domain: String,
    email: String,
    dry_run: bool,
}

impl IssuanceRequest {
    /// Validate and build a request. The domain is normalized to lowercase.
    pub fn new(domain: &str, email: &str, dry_run: bool) -> Result<Self, DeveError> {
        let domain = validate_domain(domain)?;
        let email = validate_email(email)?.to_string();
        Ok(Self {
            domain,
            email,
            dry_run,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}
