use thiserror::Error;
use url::Url;

/// Possible errors when interacting with `pacer_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The command has no URL host to route it by
    #[error("Invalid empty host")]
    EmptyHost,

    /// A command was submitted after the dispatcher started shutting down
    #[error("Send on a closed queue")]
    QueueClosed,

    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse `{0}` as URL: {1}")]
    InvalidUrl(String, url::ParseError),

    /// The given header could not be parsed.
    #[error("Header could not be parsed: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The default transport could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// Network error while executing a request
    #[error("Network error: {0}")]
    NetworkRequest(#[source] reqwest::Error),

    /// A custom transport failed without a `reqwest` error to report
    #[error("Transport error: {0}")]
    Transport(String),

    /// The configured policy does not allow fetching this URL
    #[error("Fetching {0} is disallowed by policy")]
    Disallowed(Url),
}

impl ErrorKind {
    /// Returns `true` if the error was raised while talking to the remote
    /// host, as opposed to a rejected submission.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::NetworkRequest(_) | Self::Transport(_))
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NetworkRequest(e1), Self::NetworkRequest(e2))
            | (Self::BuildRequestClient(e1), Self::BuildRequestClient(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::InvalidUrl(s1, e1), Self::InvalidUrl(s2, e2)) => s1 == s2 && e1 == e2,
            (Self::Transport(m1), Self::Transport(m2)) => m1 == m2,
            (Self::Disallowed(u1), Self::Disallowed(u2)) => u1 == u2,
            (Self::InvalidHeader(_), Self::InvalidHeader(_))
            | (Self::EmptyHost, Self::EmptyHost)
            | (Self::QueueClosed, Self::QueueClosed) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}
