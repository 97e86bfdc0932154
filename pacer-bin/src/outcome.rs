use std::fmt::{self, Display};

use pacer_lib::{Command, Context, ErrorKind};
use reqwest::Response;
use serde::Serialize;

/// The printable result of fetching one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FetchOutcome {
    pub(crate) method: String,
    pub(crate) url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl FetchOutcome {
    pub(crate) fn new(ctx: &Context, result: &pacer_lib::Result<Response>) -> Self {
        match result {
            Ok(response) => Self::from_status(ctx.command(), response.status().as_u16()),
            Err(e) => Self::from_error(ctx.command().method().as_str(), ctx.command().url().as_str(), e),
        }
    }

    fn from_status(command: &Command, status: u16) -> Self {
        Self {
            method: command.method().to_string(),
            url: command.url().to_string(),
            status: Some(status),
            error: None,
        }
    }

    /// An outcome for a URL which never reached the dispatcher, or failed in it
    pub(crate) fn from_error(method: &str, url: &str, error: &ErrorKind) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            status: None,
            error: Some(error.to_string()),
        }
    }

    /// A response was received and its status is not a client or server error
    pub(crate) fn is_success(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|status| status < 400)
    }
}

impl Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.error) {
            (Some(status), _) => write!(f, "[{status}] {} {}", self.method, self.url),
            (None, Some(error)) => write!(f, "[ERROR] {} {} | {error}", self.method, self.url),
            (None, None) => write!(f, "[?] {} {}", self.method, self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_status() {
        let outcome = FetchOutcome {
            method: "HEAD".to_string(),
            url: "https://example.com/".to_string(),
            status: Some(301),
            error: None,
        };
        assert_eq!(outcome.to_string(), "[301] HEAD https://example.com/");
        assert!(outcome.is_success());
    }

    #[test]
    fn test_display_error() {
        let outcome = FetchOutcome::from_error("GET", "mailto:someone", &ErrorKind::EmptyHost);
        assert_eq!(
            outcome.to_string(),
            "[ERROR] GET mailto:someone | Invalid empty host"
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_server_error_is_failure() {
        let outcome = FetchOutcome {
            method: "GET".to_string(),
            url: "https://example.com/".to_string(),
            status: Some(503),
            error: None,
        };
        assert!(!outcome.is_success());
    }
}
