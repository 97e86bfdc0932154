//! The HTTP transport executing the requests built from commands.
//!
//! [`reqwest::Client`] is the default transport. Anything else, for example
//! a client with custom middleware or a fake in tests, implements
//! [`Transport`].

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::{ErrorKind, Result};

/// Performs one request and returns its response.
///
/// An `Err` means the remote host was not reached; no crawl delay is owed
/// for it. Any HTTP status, including errors like 404 or 500, is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be completed.
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(ErrorKind::NetworkRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::Transport;
    use http::StatusCode;
    use reqwest::{Method, Request};
    use test_utils::mock_server;
    use url::Url;

    #[tokio::test]
    async fn test_reqwest_client_reports_any_status_as_ok() {
        let mock_server = mock_server!(StatusCode::NOT_FOUND);
        let url = Url::parse(&mock_server.uri()).unwrap();

        let client = reqwest::Client::new();
        let response = Transport::execute(&client, Request::new(Method::GET, url))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reqwest_client_unreachable_host_is_err() {
        // Port 1 on localhost is reserved and refuses connections
        let url = Url::parse("http://127.0.0.1:1/").unwrap();

        let client = reqwest::Client::new();
        let result = Transport::execute(&client, Request::new(Method::GET, url)).await;

        assert!(result.unwrap_err().is_network());
    }
}
