use std::convert::TryFrom;
use std::fmt;

use crate::domain::errors::MalformedInput;

/// Minimal length of a syntactically plausible address, e.g. `a@b.c`.
const MIN_LENGTH: usize = 5;

/// An email address normalized to its uniqueness key: trimmed and
/// lowercased. The format check is deliberately loose (`@`, `.`, minimal
/// length), not an RFC validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriberEmail(String);

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SubscriberEmail {
    type Error = MalformedInput;

    fn try_from(email: String) -> Result<Self, Self::Error> {
        let normalized = email.trim().to_lowercase();
        if normalized.len() >= MIN_LENGTH
            && normalized.contains('@')
            && normalized.contains('.')
        {
            Ok(SubscriberEmail(normalized))
        } else {
            Err(MalformedInput::InvalidEmail { email })
        }
    }
}
