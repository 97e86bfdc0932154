use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use cookie_store::RawCookie;
use http::{HeaderMap, Method};
use typed_builder::TypedBuilder;
use url::Url;

use crate::dispatch::HostKey;
use crate::{BasicAuthCredentials, ErrorKind, Handler, Result};

/// A single fetch request, as submitted to a [`crate::Dispatcher`].
///
/// Besides the URL and method, a command optionally carries the extra
/// pieces used to build the outgoing request. They are applied in this
/// order:
///
/// 1. `headers`
/// 2. `basic_auth`, which replaces any `Authorization` header
/// 3. `cookies`, which are always appended to the `Cookie` header
/// 4. `body`, or `form` if no body is set
///
/// A command is immutable once built.
///
/// ```
/// use pacer_lib::{BasicAuthCredentials, Command};
/// use http::Method;
/// use url::Url;
///
/// let command = Command::builder()
///     .url(Url::parse("https://example.com/login").unwrap())
///     .method(Method::POST)
///     .basic_auth(BasicAuthCredentials::new("user", "secret"))
///     .form(vec![("remember".to_string(), "1".to_string())])
///     .build();
///
/// assert_eq!(command.method(), Method::POST);
/// ```
#[derive(TypedBuilder, Clone)]
#[builder(builder_method(doc = "
Create a builder for a `Command`.

Only `url` is required; the method defaults to `GET`.
"))]
pub struct Command {
    /// Target of the request
    #[builder(setter(into))]
    url: Url,

    /// HTTP method, `GET` unless specified
    #[builder(default = Method::GET)]
    method: Method,

    /// Headers sent with the request
    #[builder(default)]
    headers: HeaderMap,

    /// Cookies appended to the `Cookie` header
    #[builder(default)]
    cookies: Vec<RawCookie<'static>>,

    /// Credentials for basic authentication
    #[builder(default, setter(strip_option))]
    basic_auth: Option<BasicAuthCredentials>,

    /// Raw request body. Has priority over `form`.
    #[builder(default, setter(strip_option, into))]
    body: Option<Vec<u8>>,

    /// Form values, sent url-encoded when no `body` is set
    #[builder(default, setter(strip_option))]
    form: Option<Vec<(String, String)>>,

    /// Handler for this command only, used instead of the dispatcher's
    #[builder(default, setter(strip_option))]
    handler: Option<Arc<dyn Handler>>,
}

impl Command {
    /// Create a command with the given method and no extras
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self::builder().url(url).method(method).build()
    }

    /// Create a `GET` command
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a `HEAD` command
    #[must_use]
    pub fn head(url: Url) -> Self {
        Self::new(Method::HEAD, url)
    }

    /// Parse `url` and create a command with the given method
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidUrl`] if `url` cannot be parsed.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| ErrorKind::InvalidUrl(url.to_string(), e))?;
        Ok(Self::new(method, parsed))
    }

    /// The target URL
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The HTTP method
    #[must_use]
    pub fn method(&self) -> Method {
        self.method.clone()
    }

    /// Headers set on this command
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Cookies set on this command
    #[must_use]
    pub fn cookies(&self) -> &[RawCookie<'static>] {
        &self.cookies
    }

    /// Basic auth credentials, if any
    #[must_use]
    pub const fn basic_auth(&self) -> Option<&BasicAuthCredentials> {
        self.basic_auth.as_ref()
    }

    /// Raw body, if any
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Form values, if any
    #[must_use]
    pub fn form(&self) -> Option<&[(String, String)]> {
        self.form.as_deref()
    }

    /// The handler override for this command, if any
    #[must_use]
    pub fn handler(&self) -> Option<&Arc<dyn Handler>> {
        self.handler.as_ref()
    }

    /// The key this command is serialized under
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptyHost`] if the URL has no host.
    pub fn host_key(&self) -> Result<HostKey> {
        HostKey::try_from(&self.url)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies.len())
            .field("basic_auth", &self.basic_auth.as_ref().map(|c| &c.username))
            .field("body", &self.body.as_ref().map(Vec::len))
            .field("form", &self.form)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

impl From<Url> for Command {
    fn from(url: Url) -> Self {
        Self::get(url)
    }
}

impl TryFrom<&str> for Command {
    type Error = ErrorKind;

    fn try_from(url: &str) -> Result<Self> {
        Self::parse(Method::GET, url)
    }
}

impl TryFrom<String> for Command {
    type Error = ErrorKind;

    fn try_from(url: String) -> Result<Self> {
        Self::try_from(url.as_str())
    }
}
