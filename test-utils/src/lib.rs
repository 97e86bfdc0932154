//! `test-utils` is used for testing in both `pacer-lib` and `pacer-bin`.
//! This crate does not depend on `pacer-lib` or `pacer-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Mount a response with the given status for any method on `path` of an
/// existing mock server. Mounted routes take priority over earlier ones.
#[macro_export]
macro_rules! mount_path {
    ($server:expr, $path:expr, $status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::path($path))
            .respond_with(template)
            .with_priority(1)
            .mount(&$server)
            .await;
    }};
}

/// Build full URLs for the given paths on a mock server
#[macro_export]
macro_rules! mock_urls {
    ($server:expr, [$($path:expr),* $(,)?]) => {{
        let base = $server.uri();
        vec![$(format!("{base}{}", $path)),*]
    }};
}

/// Paths of the requests a mock server received, in arrival order
#[macro_export]
macro_rules! received_paths {
    ($server:expr) => {{
        $server
            .received_requests()
            .await
            .expect("request recording is enabled")
            .iter()
            .map(|request| request.url.path().to_string())
            .collect::<Vec<_>>()
    }};
}
