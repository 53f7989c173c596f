//! Domain name validation.
//!
//! The domain ends up as a certificate subject and as an argument to the
//! issuing tool, so it is checked strictly before any container is touched.

use crate::error::DeveError;

use super::invalid;

/// Maximum length for a domain name.
const MAX_DOMAIN_LENGTH: usize = 253;

/// Maximum length for a domain label (part between dots).
const MAX_LABEL_LENGTH: usize = 63;

/// Validates a domain name and returns it normalized.
///
/// # Rules
///
/// - 1-253 characters, at least two labels (no bare TLDs)
/// - Each label 1-63 characters of ASCII letters, digits and inner hyphens
/// - No wildcards: HTTP-01 validation cannot prove control of them
/// - A single trailing dot is accepted and dropped
///
/// The result is lowercased.
pub fn validate_domain(domain: &str) -> Result<String, DeveError> {
    let trimmed = domain.strip_suffix('.').unwrap_or(domain);

    if trimmed.is_empty() {
        return Err(invalid("domain", "Domain name cannot be empty"));
    }

    if trimmed.len() > MAX_DOMAIN_LENGTH {
        return Err(invalid(
            "domain",
            format!(
                "Domain name exceeds maximum length of {} characters",
                MAX_DOMAIN_LENGTH
            ),
        ));
    }

    if trimmed.contains('*') {
        return Err(invalid(
            "domain",
            "Wildcard domains cannot be issued with HTTP-01 validation",
        ));
    }

    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid(
            "domain",
            "Domain must have at least two parts (e.g., example.com)",
        ));
    }

    for label in labels {
        check_label(label)?;
    }

    Ok(trimmed.to_ascii_lowercase())
}

fn check_label(label: &str) -> Result<(), DeveError> {
    if label.is_empty() {
        return Err(invalid(
            "domain",
            "Domain contains empty label (consecutive dots)",
        ));
    }

    if label.len() > MAX_LABEL_LENGTH {
        return Err(invalid(
            "domain",
            format!(
                "Domain label '{}' exceeds maximum length of {} characters",
                label, MAX_LABEL_LENGTH
            ),
        ));
    }

    if let Some(c) = label
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-')
    {
        return Err(invalid(
            "domain",
            format!("Domain label '{}' contains invalid character '{}'", label, c),
        ));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(invalid(
            "domain",
            format!("Domain label '{}' cannot start or end with a hyphen", label),
        ));
    }

    Ok(())
}
