use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Request, Response};
use tokio::time::Instant;
use url::Url;

use crate::{Context, ErrorKind, Handler, HostKey, Policy, Result, Transport};

/// A transport which answers every request with an empty `200 OK`, or an
/// error for the configured paths. Records when each request started.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    latency: Duration,
    failing: Vec<&'static str>,
    started: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    /// Every request takes `latency` to complete
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Requests for any of `paths` fail in the transport
    pub(crate) fn failing_on<const N: usize>(paths: [&'static str; N]) -> Self {
        Self {
            failing: paths.to_vec(),
            ..Self::default()
        }
    }

    /// Number of requests started so far
    pub(crate) fn requests(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub(crate) fn started(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    /// Highest number of requests which were in flight at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.started.lock().unwrap().push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|path| *path == request.url().path()) {
            return Err(ErrorKind::Transport(format!(
                "connection refused: {}",
                request.url()
            )));
        }
        Ok(Response::from(http::Response::new("")))
    }
}

/// What a [`RecordingHandler`] saw for one command
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) path: String,
    pub(crate) at: Instant,
    pub(crate) success: bool,
    pub(crate) status: Option<StatusCode>,
    pub(crate) error: Option<ErrorKind>,
}

/// Records every outcome it is handed, in order
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingHandler(Arc<Mutex<Vec<Outcome>>>);

impl RecordingHandler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Paths of the handled commands, in handling order
    pub(crate) fn paths(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|outcome| outcome.path.clone())
            .collect()
    }

    /// Take all outcomes recorded so far
    pub(crate) fn take_outcomes(&self) -> Vec<Outcome> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle(&self, ctx: Context, result: Result<Response>) {
        let (status, error) = match result {
            Ok(response) => (Some(response.status()), None),
            Err(e) => (None, Some(e)),
        };
        self.0.lock().unwrap().push(Outcome {
            path: ctx.command().url().path().to_string(),
            at: Instant::now(),
            success: error.is_none(),
            status,
            error,
        });
    }
}

/// Refuses every URL whose path starts with the given prefix
#[derive(Debug)]
pub(crate) struct DenyPrefix(pub(crate) &'static str);

#[async_trait]
impl Policy for DenyPrefix {
    async fn allowed(&self, _host: &HostKey, url: &Url) -> bool {
        !url.path().starts_with(self.0)
    }
}

/// Allows everything but asks for a minimum crawl delay
#[derive(Debug)]
pub(crate) struct SlowPolicy(pub(crate) Duration);

#[async_trait]
impl Policy for SlowPolicy {
    async fn allowed(&self, _host: &HostKey, _url: &Url) -> bool {
        true
    }

    fn crawl_delay(&self, _host: &HostKey) -> Option<Duration> {
        Some(self.0)
    }
}

/// Closes the dispatcher after the first outcome
#[derive(Debug)]
pub(crate) struct CloseOnFirst;

#[async_trait]
impl Handler for CloseOnFirst {
    async fn handle(&self, ctx: Context, _result: Result<Response>) {
        let dispatcher = ctx.dispatcher().clone();
        tokio::spawn(async move { dispatcher.close().await });
    }
}

/// Panics when handling a command for the given path
#[derive(Debug)]
pub(crate) struct PanicOn(pub(crate) &'static str);

#[async_trait]
impl Handler for PanicOn {
    async fn handle(&self, ctx: Context, _result: Result<Response>) {
        assert_ne!(ctx.command().url().path(), self.0, "handler blew up");
    }
}

/// Takes its time with every outcome
#[derive(Debug)]
pub(crate) struct SlowHandler(pub(crate) Duration);

#[async_trait]
impl Handler for SlowHandler {
    async fn handle(&self, _ctx: Context, _result: Result<Response>) {
        tokio::time::sleep(self.0).await;
    }
}
