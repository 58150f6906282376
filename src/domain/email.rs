use crate::error::CheckoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+$").expect("email pattern is valid")
});

/// Shown next to the email field while the input does not look like an address.
pub const INVALID_EMAIL_MESSAGE: &str = "Invalid email address";

/// A receipt email address that passed the client-side shape check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Trims surrounding whitespace and checks the remaining text.
    pub fn parse(input: &str) -> Result<Self, CheckoutError> {
        let trimmed = input.trim();
        if is_valid_email(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(CheckoutError::Validation(INVALID_EMAIL_MESSAGE.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The email-shape predicate used by the receipt form.
pub fn is_valid_email(input: &str) -> bool {
    EMAIL_REGEX.is_match(input)
}

/// Inline error for the email field: nothing while empty or valid.
pub fn field_error(input: &str) -> Option<&'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() || is_valid_email(trimmed) {
        None
    } else {
        Some(INVALID_EMAIL_MESSAGE)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = CheckoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
