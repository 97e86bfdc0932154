use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::ErrorKind;
use crate::types::Result;

/// The serialization key of a [`crate::Command`].
///
/// This is the lowercased host of the URL, followed by the port if one was
/// given explicitly. Requests sharing a key are executed one at a time and
/// paced; requests with different keys run in parallel.
///
/// # Examples
///
/// ```
/// use pacer_lib::HostKey;
/// use url::Url;
///
/// let url = Url::parse("https://API.github.com/repos/user/repo").unwrap();
/// let host_key = HostKey::try_from(&url).unwrap();
/// assert_eq!(host_key.as_str(), "api.github.com");
///
/// let url = Url::parse("http://localhost:8080/").unwrap();
/// assert_eq!(HostKey::try_from(&url).unwrap().as_str(), "localhost:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HostKey(String);

impl HostKey {
    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the key as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_lowercase(),
            _ => return Err(ErrorKind::EmptyHost),
        };

        Ok(match url.port() {
            Some(port) => HostKey(format!("{host}:{port}")),
            None => HostKey(host),
        })
    }
}

impl TryFrom<Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: Url) -> Result<Self> {
        HostKey::try_from(&url)
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HostKey {
    fn from(host: String) -> Self {
        HostKey(host.to_lowercase())
    }
}

impl From<&str> for HostKey {
    fn from(host: &str) -> Self {
        HostKey(host.to_lowercase())
    }
}

impl From<HostKey> for String {
    fn from(key: HostKey) -> Self {
        key.0
    }
}
