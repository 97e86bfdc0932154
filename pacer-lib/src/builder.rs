use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use typed_builder::TypedBuilder;

use crate::dispatch::{
    DEFAULT_CRAWL_DELAY, DEFAULT_USER_AGENT, DEFAULT_WORKER_IDLE_TTL, DispatchConfig, Dispatcher,
    HostConfigs, Settings,
};
use crate::{ErrorKind, Handler, Policy, Result, Transport};

/// Builder for [`Dispatcher`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Clone)]
#[builder(builder_method(doc = "
Create a builder for building `DispatcherBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `DispatcherBuilder`.
"))]
pub struct DispatcherBuilder {
    /// Minimum time between the end of a successful request and the start
    /// of the next request to the same host.
    #[builder(default = DEFAULT_CRAWL_DELAY)]
    crawl_delay: Duration,
    /// How long a host worker waits for new commands before it shuts down.
    #[builder(default = DEFAULT_WORKER_IDLE_TTL)]
    worker_idle_ttl: Duration,
    /// User-agent sent with requests which don't set their own.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)", setter(into))]
    user_agent: String,
    /// When `true`, the dispatcher closes itself as soon as the last host
    /// worker went idle.
    #[builder(default)]
    auto_close: bool,
    /// Response timeout per request, only used by the default transport.
    #[builder(default, setter(strip_option))]
    timeout: Option<Duration>,
    /// Per-host overrides, see [`crate::HostConfig`].
    #[builder(default, setter(into))]
    hosts: HostConfigs,
    /// Executes requests. Defaults to a [`reqwest::Client`].
    #[builder(default, setter(strip_option))]
    transport: Option<Arc<dyn Transport>>,
    /// Decides whether a URL may be fetched at all, e.g. from `robots.txt`.
    #[builder(default, setter(strip_option))]
    policy: Option<Arc<dyn Policy>>,
}

impl Default for DispatcherBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<DispatchConfig> for DispatcherBuilder {
    fn from(config: DispatchConfig) -> Self {
        Self {
            crawl_delay: config.crawl_delay,
            worker_idle_ttl: config.worker_idle_ttl,
            user_agent: config.user_agent,
            auto_close: config.auto_close,
            timeout: config.timeout,
            hosts: config.hosts,
            transport: None,
            policy: None,
        }
    }
}

impl DispatcherBuilder {
    /// Start a [`Dispatcher`] which passes every outcome to `handler`.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is not a valid header value.
    /// - The default request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<H: Handler + 'static>(self, handler: H) -> Result<Dispatcher> {
        self.start_with(Arc::new(handler))
    }

    /// Same as [`DispatcherBuilder::start`], for a handler which is
    /// already shared.
    ///
    /// # Errors
    ///
    /// See [`DispatcherBuilder::start`].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start_with(self, handler: Arc<dyn Handler>) -> Result<Dispatcher> {
        let user_agent = HeaderValue::from_str(&self.user_agent).map_err(ErrorKind::InvalidHeader)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(default_client(self.timeout)?),
        };

        let settings = Settings {
            crawl_delay: self.crawl_delay,
            worker_idle_ttl: self.worker_idle_ttl,
            user_agent,
            auto_close: self.auto_close,
            hosts: self.hosts,
        };

        Ok(Dispatcher::start(settings, transport, self.policy, handler))
    }
}

fn default_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let builder = reqwest::ClientBuilder::new().gzip(true);

    (match timeout {
        Some(t) => builder.timeout(t),
        None => builder,
    })
    .build()
    .map_err(ErrorKind::BuildRequestClient)
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("crawl_delay", &self.crawl_delay)
            .field("worker_idle_ttl", &self.worker_idle_ttl)
            .field("user_agent", &self.user_agent)
            .field("auto_close", &self.auto_close)
            .field("timeout", &self.timeout)
            .field("hosts", &self.hosts)
            .field("transport", &self.transport.is_some())
            .field("policy", &self.policy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use test_utils::mock_server;

    use super::*;
    use crate::test_utils::RecordingHandler;

    #[tokio::test]
    async fn test_invalid_user_agent() {
        let result = DispatcherBuilder::builder()
            .user_agent("bad\nagent")
            .build()
            .start(RecordingHandler::new());

        assert!(matches!(result, Err(ErrorKind::InvalidHeader(_))));
    }

    #[test]
    fn test_from_config() {
        let config: DispatchConfig = toml::from_str(
            r#"
            crawl_delay = "2s"
            auto_close = true
            user_agent = "custom/1.0"
            "#,
        )
        .unwrap();

        let builder = DispatcherBuilder::from(config);
        assert_eq!(builder.crawl_delay, Duration::from_secs(2));
        assert_eq!(builder.worker_idle_ttl, DEFAULT_WORKER_IDLE_TTL);
        assert_eq!(builder.user_agent, "custom/1.0");
        assert!(builder.auto_close);
        assert!(builder.transport.is_none());
    }

    #[test]
    fn test_default_matches_default_config() {
        let builder = DispatcherBuilder::default();
        let from_config = DispatcherBuilder::from(DispatchConfig::default());

        assert_eq!(format!("{builder:?}"), format!("{from_config:?}"));
    }

    #[tokio::test]
    async fn test_default_transport_sends_user_agent() {
        let mock_server = mock_server!(StatusCode::OK);
        let handler = RecordingHandler::new();
        let dispatcher = DispatcherBuilder::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("pacer-test/1.0")
            .build()
            .start(handler.clone())
            .unwrap();

        dispatcher.send_get([mock_server.uri()]).1.unwrap();
        dispatcher.close().await;

        let outcomes = handler.take_outcomes();
        assert_eq!(outcomes[0].status, Some(StatusCode::OK));

        let received = mock_server.received_requests().await.unwrap();
        assert_eq!(received[0].headers["user-agent"], "pacer-test/1.0");
    }
}
