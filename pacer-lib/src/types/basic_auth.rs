use std::str::FromStr;

use headers::authorization::Credentials;
use headers::{Authorization, authorization::Basic};
use http::HeaderMap;
use http::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;

/// Reasons a `<username>:<password>` string is rejected
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum BasicAuthCredentialsParseError {
    /// No colon separating username and password
    #[error("Invalid basic auth credentials syntax")]
    InvalidSyntax,

    /// Empty password
    #[error("Missing basic auth password")]
    MissingPassword,

    /// Empty username
    #[error("Missing basic auth username")]
    MissingUsername,

    /// More than one colon
    #[error(
        "Too many values separated by colon. Expected 2, got {0}. Valid form is '<username>:<password>'"
    )]
    TooManyParts(usize),
}

/// [`BasicAuthCredentials`] contains a pair of basic auth values consisting of
/// a username and password.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
pub struct BasicAuthCredentials {
    /// Basic auth username
    pub username: String,

    /// Basic auth password
    pub password: String,
}

impl BasicAuthCredentials {
    /// Create credentials from a username and password pair
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the credentials as [`Authorization<Basic>`].
    #[must_use]
    pub fn to_authorization(&self) -> Authorization<Basic> {
        Authorization::basic(&self.username, &self.password)
    }

    /// Set the `Authorization` header, replacing any value already present.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.to_authorization().0.encode());
    }
}

impl FromStr for BasicAuthCredentials {
    type Err = BasicAuthCredentialsParseError;

    fn from_str(credentials: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = credentials.trim().split(':').collect();

        if parts.len() <= 1 {
            return Err(BasicAuthCredentialsParseError::InvalidSyntax);
        }

        if parts.len() > 2 {
            return Err(BasicAuthCredentialsParseError::TooManyParts(parts.len()));
        }

        if parts[0].is_empty() {
            return Err(BasicAuthCredentialsParseError::MissingUsername);
        }

        if parts[1].is_empty() {
            return Err(BasicAuthCredentialsParseError::MissingPassword);
        }

        Ok(Self::new(parts[0], parts[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use rstest::rstest;

    #[rstest]
    #[case("user:pass", Ok(BasicAuthCredentials::new("user", "pass")))]
    #[case("user", Err(BasicAuthCredentialsParseError::InvalidSyntax))]
    #[case(":pass", Err(BasicAuthCredentialsParseError::MissingUsername))]
    #[case("user:", Err(BasicAuthCredentialsParseError::MissingPassword))]
    #[case("a:b:c", Err(BasicAuthCredentialsParseError::TooManyParts(3)))]
    fn test_parse_credentials(
        #[case] input: &str,
        #[case] expected: Result<BasicAuthCredentials, BasicAuthCredentialsParseError>,
    ) {
        assert_eq!(BasicAuthCredentials::from_str(input), expected);
    }

    #[test]
    fn test_apply_overrides_existing_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token"));

        BasicAuthCredentials::new("user", "pass").apply(&mut headers);

        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }
}
