//! Normalised email addresses.
//!
//! Staff logins and the customer check on order lookups compare addresses
//! case-insensitively, so an [`Email`] is always stored trimmed and lowercased.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an email address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,

    #[error("email must be at most {} characters", Email::MAX_LENGTH)]
    TooLong,

    /// Not of the form `local@domain` with a single `@` and no spaces.
    #[error("email must look like name@domain")]
    Malformed,
}

/// A customer or staff mailbox, trimmed and lowercased.
///
/// ```
/// use nefol_core::Email;
///
/// let email = Email::parse(" Ops@TheNefol.com ").unwrap();
/// assert_eq!(email.as_str(), "ops@thenefol.com");
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("a@b@c.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalise an address.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` when the trimmed input is empty, longer than
    /// [`Self::MAX_LENGTH`], or not a single `local@domain` pair.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }

        let well_formed = trimmed.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !trimmed.chars().any(char::is_whitespace)
        });
        if !well_formed {
            return Err(EmailError::Malformed);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalises_case_and_padding() {
        let email = Email::parse("  Priya.Sharma@Gmail.COM\n").unwrap();
        assert_eq!(email.as_str(), "priya.sharma@gmail.com");
        assert_eq!(email, Email::parse("priya.sharma@gmail.com").unwrap());
    }

    #[test]
    fn test_accepts_plus_and_subdomains() {
        assert!(Email::parse("user+tag@mail.example.co.in").is_ok());
        assert!(Email::parse("a@b.c").is_ok());
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("no-at-symbol"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("@thenefol.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("orders@"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("asha verma@x.com"), Err(EmailError::Malformed));

        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
    }

    #[test]
    fn test_deserialize_validates() {
        let email: Email = serde_json::from_str("\"Orders@TheNefol.com\"").unwrap();
        assert_eq!(email.as_str(), "orders@thenefol.com");
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"orders@thenefol.com\"");
    }
}
