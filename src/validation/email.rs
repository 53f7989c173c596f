//! Contact email validation.

use crate::error::DeveError;

use super::invalid;

/// Maximum length of an email address.
const MAX_EMAIL_LENGTH: usize = 254;

/// Validates the ACME contact address.
///
/// A shape check, not RFC 5322: one `@`, both sides present, a dot in the
/// domain part, and no whitespace, control or shell metacharacters (the
/// address is handed to the issuing tool as an argument).
pub fn validate_email(email: &str) -> Result<&str, DeveError> {
    if email.is_empty() {
        return Err(invalid("email", "Email cannot be empty"));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid("email", "Email exceeds maximum length"));
    }

    if let Some(c) = email.chars().find(|c| is_forbidden(*c)) {
        return Err(invalid(
            "email",
            format!("Email contains invalid character: '{}'", c.escape_default()),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid("email", "Invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid("email", "Invalid email format"));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("email", "Email domain must contain a dot"));
    }

    Ok(email)
}

fn is_forbidden(c: char) -> bool {
    c.is_whitespace()
        || c.is_control()
        || matches!(
            c,
            '<' | '>'
                | '"'
                | '\''
                | '`'
                | '$'
                | '&'
                | '|'
                | ';'
                | '('
                | ')'
                | '['
                | ']'
                | '{'
                | '}'
                | '\\'
                | '!'
                | '#'
                | '*'
                | '?'
                | '~'
        )
}
