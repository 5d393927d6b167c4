//! Identity claims entered on the login form.

use std::fmt;

/// Why an identity claim was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Email is required")]
    MissingEmail,

    #[error("Please enter a valid email address")]
    MalformedEmail,

    #[error("Name is required")]
    MissingName,
}

/// An email or display name the user claims to be.
///
/// Construction validates and normalizes, so a claim always holds the exact
/// string sent to the recognition service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityClaim {
    Email(String),
    DisplayName(String),
}

impl IdentityClaim {
    /// Validate an email and normalize it (trimmed, lower-cased).
    pub fn email(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        if !is_valid_email(trimmed) {
            return Err(ValidationError::MalformedEmail);
        }
        Ok(Self::Email(trimmed.to_lowercase()))
    }

    /// Validate a display name (trimmed, case preserved).
    pub fn display_name(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingName);
        }
        Ok(Self::DisplayName(trimmed.to_string()))
    }

    /// The normalized value transmitted to the service.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(s) | Self::DisplayName(s) => s,
        }
    }
}

impl fmt::Display for IdentityClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic email shape check: `local@domain.tld`, no whitespace, a single `@`,
/// and a dot somewhere after the first domain character.
pub fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // At least one char before and after some dot in the domain
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
