//! End-to-end tests of the dispatcher with its default transport
#[cfg(test)]
mod dispatch {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use cookie_store::RawCookie;
    use http::{HeaderMap, Method, StatusCode};
    use pacer_lib::{
        BasicAuthCredentials, Command, Dispatcher, DispatcherBuilder, FnHandler, HostConfig,
        HostConfigs, HostKey,
    };
    use pretty_assertions::assert_eq;
    use test_utils::{mock_server, mock_urls, received_paths};
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{basic_auth, body_string, header, method, path},
    };

    type Statuses = Arc<Mutex<Vec<(String, Option<u16>)>>>;

    /// Start a dispatcher which records the path and status of every outcome
    fn recording(builder: DispatcherBuilder) -> (Dispatcher, Statuses) {
        let statuses = Statuses::default();
        let handler = {
            let statuses = statuses.clone();
            FnHandler::new(move |ctx, result| {
                let status = result.ok().map(|response| response.status().as_u16());
                statuses
                    .lock()
                    .unwrap()
                    .push((ctx.command().url().path().to_string(), status));
            })
        };
        let dispatcher = builder.start(handler).unwrap();
        (dispatcher, statuses)
    }

    fn host_of(server: &MockServer) -> HostKey {
        HostKey::try_from(&Url::parse(&server.uri()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_same_host_requests_in_submission_order() {
        let mock_server = mock_server!(StatusCode::OK);
        let (dispatcher, statuses) = recording(
            DispatcherBuilder::builder()
                .crawl_delay(Duration::ZERO)
                .build(),
        );

        let urls = mock_urls!(mock_server, ["/a", "/b", "/c", "/d", "/e"]);
        let (sent, result) = dispatcher.send_get(&urls);
        assert_eq!(sent, 5);
        assert!(result.is_ok());

        dispatcher.close().await;

        assert_eq!(
            received_paths!(mock_server),
            vec!["/a", "/b", "/c", "/d", "/e"]
        );
        assert_eq!(statuses.lock().unwrap().len(), 5);
        assert_eq!(dispatcher.stats().requests, 5);
    }

    #[tokio::test]
    async fn test_crawl_delay_between_requests() {
        let mock_server = mock_server!(StatusCode::OK);
        let (dispatcher, _) = recording(
            DispatcherBuilder::builder()
                .crawl_delay(Duration::from_millis(300))
                .build(),
        );

        let start = Instant::now();
        dispatcher.send_get(mock_urls!(mock_server, ["/1", "/2", "/3"]));
        dispatcher.close().await;

        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_status_is_passed_to_handler() {
        let mock_server = mock_server!(StatusCode::NOT_FOUND);
        let (dispatcher, statuses) = recording(DispatcherBuilder::default());

        dispatcher.send_get(mock_urls!(mock_server, ["/gone"]));
        dispatcher.close().await;

        assert_eq!(
            *statuses.lock().unwrap(),
            vec![("/gone".to_string(), Some(404))]
        );
    }

    #[tokio::test]
    async fn test_host_headers_and_command_override() {
        let mock_server = MockServer::start().await;
        Mock::given(path("/default"))
            .and(header("accept", "text/html"))
            .and(header("x-team", "crawlers"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(path("/override"))
            .and(header("accept", "application/json"))
            .and(header("x-team", "crawlers"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("accept", "text/html".parse().unwrap());
        headers.insert("x-team", "crawlers".parse().unwrap());
        let hosts = HostConfigs::from([(
            host_of(&mock_server),
            HostConfig {
                crawl_delay: Some(Duration::ZERO),
                headers,
            },
        )]);
        let (dispatcher, statuses) = recording(DispatcherBuilder::builder().hosts(hosts).build());

        let base = Url::parse(&mock_server.uri()).unwrap();
        dispatcher
            .send(Command::get(base.join("/default").unwrap()))
            .unwrap();

        let mut json = HeaderMap::new();
        json.insert("accept", "application/json".parse().unwrap());
        dispatcher
            .send(
                Command::builder()
                    .url(base.join("/override").unwrap())
                    .headers(json)
                    .build(),
            )
            .unwrap();
        dispatcher.close().await;

        assert_eq!(
            *statuses.lock().unwrap(),
            vec![
                ("/default".to_string(), Some(200)),
                ("/override".to_string(), Some(200)),
            ]
        );
    }

    #[tokio::test]
    async fn test_credentials_cookies_and_form() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(basic_auth("user", "secret"))
            .and(header("cookie", "session=abc; theme=dark"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("remember=1&next=%2Fhome"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (dispatcher, statuses) = recording(DispatcherBuilder::default());
        let url = Url::parse(&mock_server.uri()).unwrap().join("/login").unwrap();
        let command = Command::builder()
            .url(url)
            .method(Method::POST)
            .basic_auth(BasicAuthCredentials::new("user", "secret"))
            .cookies(vec![
                RawCookie::new("session", "abc"),
                RawCookie::new("theme", "dark"),
            ])
            .form(vec![
                ("remember".to_string(), "1".to_string()),
                ("next".to_string(), "/home".to_string()),
            ])
            .build();

        dispatcher.send(command).unwrap();
        dispatcher.close().await;

        assert_eq!(
            *statuses.lock().unwrap(),
            vec![("/login".to_string(), Some(204))]
        );
    }

    #[tokio::test]
    async fn test_handler_submits_follow_ups_until_auto_close() {
        let mock_server = mock_server!(StatusCode::OK);
        let base = Url::parse(&mock_server.uri()).unwrap();

        let handler = FnHandler::new(move |ctx, _result| {
            // Follow the chain /0 -> /1 -> /2
            let depth: u32 = ctx.command().url().path()[1..].parse().unwrap();
            if depth < 2 {
                let next = ctx.command().url().join(&format!("/{}", depth + 1)).unwrap();
                ctx.dispatcher().send(Command::get(next)).unwrap();
            }
        });
        let dispatcher = DispatcherBuilder::builder()
            .crawl_delay(Duration::ZERO)
            .worker_idle_ttl(Duration::from_millis(200))
            .auto_close(true)
            .build()
            .start(handler)
            .unwrap();

        dispatcher
            .send(Command::get(base.join("/0").unwrap()))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(10), dispatcher.block())
            .await
            .unwrap();

        assert!(dispatcher.is_closed());
        assert!(!dispatcher.is_cancelled());
        assert!(dispatcher.active_hosts().is_empty());
        assert_eq!(received_paths!(mock_server), vec!["/0", "/1", "/2"]);
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&slow)
            .await;
        let fast = mock_server!(StatusCode::OK);

        let (dispatcher, statuses) = recording(
            DispatcherBuilder::builder()
                .crawl_delay(Duration::ZERO)
                .build(),
        );

        dispatcher.send_get(mock_urls!(slow, ["/slow"]));
        dispatcher.send_get(mock_urls!(fast, ["/fast"]));
        dispatcher.close().await;

        // The fast host doesn't wait for the slow one
        let paths: Vec<_> = statuses
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect();
        assert_eq!(paths, vec!["/fast", "/slow"]);
        assert_eq!(dispatcher.stats().workers_spawned, 2);
    }
}
