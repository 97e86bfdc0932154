use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use http::{HeaderMap, HeaderValue, Method};
use log::{debug, trace};
use tokio::sync::mpsc;

use super::bridge;
use super::lifecycle::{Lifecycle, State};
use super::stats::{Counters, DispatcherStats};
use super::waiter::{WaitGroup, WaitGuard};
use super::worker::HostWorker;
use super::{HostConfigs, HostKey};
use crate::{Command, ErrorKind, Handler, Policy, Result, Transport};

/// Settings shared by all host workers of one dispatcher
pub(crate) struct Settings {
    pub(crate) crawl_delay: Duration,
    pub(crate) worker_idle_ttl: Duration,
    pub(crate) user_agent: HeaderValue,
    pub(crate) auto_close: bool,
    pub(crate) hosts: HostConfigs,
}

impl Settings {
    pub(crate) fn crawl_delay_for(&self, host: &HostKey) -> Duration {
        self.hosts
            .get(host)
            .map_or(self.crawl_delay, |config| {
                config.effective_crawl_delay(self.crawl_delay)
            })
    }

    pub(crate) fn headers_for(&self, host: &HostKey) -> Option<&HeaderMap> {
        self.hosts
            .get(host)
            .map(|config| &config.headers)
            .filter(|headers| !headers.is_empty())
    }
}

enum Message {
    Command(HostKey, Command),
    /// An idle worker asks to be retired, after receiving that many commands
    Retire {
        host: HostKey,
        generation: u64,
        received: u64,
    },
    Shutdown,
}

/// The sending side of a host's queue, as kept in the host table
struct HostEntry {
    queue: mpsc::Sender<Command>,
    generation: u64,
    /// Commands handed to this worker so far
    handed: u64,
}

pub(crate) struct Shared {
    pub(crate) settings: Settings,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) policy: Option<Arc<dyn Policy>>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) counters: Counters,
    /// Only modified by the routing task, and only ever locked for a
    /// lookup, insert or removal
    hosts: Mutex<HashMap<HostKey, HostEntry>>,
    input: mpsc::UnboundedSender<Message>,
}

/// Routes commands to per-host workers and owns their shutdown.
///
/// Commands for the same host are executed one at a time, in submission
/// order, with at least the crawl delay between the end of a successful
/// request and the start of the next one. Commands for different hosts run
/// in parallel.
///
/// A `Dispatcher` is a cheap handle; clones refer to the same dispatcher.
/// It is created with [`crate::DispatcherBuilder`] and has to be shut down
/// with [`Dispatcher::close`] or [`Dispatcher::cancel`] (or by enabling
/// `auto_close`).
///
/// ```no_run
/// use pacer_lib::{DispatcherBuilder, FnHandler, Result};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let dispatcher = DispatcherBuilder::builder()
///         .crawl_delay(Duration::from_secs(1))
///         .build()
///         .start(FnHandler::new(|ctx, result| {
///             if let Ok(response) = result {
///                 println!("{} {}", response.status(), ctx.command().url());
///             }
///         }))?;
///
///     let (sent, result) = dispatcher.send_get([
///         "https://example.com/",
///         "https://example.com/about",
///         "https://example.org/",
///     ]);
///     result?;
///     assert_eq!(sent, 3);
///
///     dispatcher.close().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) shared: Arc<Shared>,
}

impl Dispatcher {
    /// Spawn the routing task and return a handle to it.
    /// Must be called from within a Tokio runtime.
    pub(crate) fn start(
        settings: Settings,
        transport: Arc<dyn Transport>,
        policy: Option<Arc<dyn Policy>>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let (input, commands) = mpsc::unbounded_channel();
        let (waiter, guard) = WaitGroup::new();

        let dispatcher = Self {
            shared: Arc::new(Shared {
                settings,
                transport,
                policy,
                handler,
                lifecycle: Lifecycle::new(waiter),
                counters: Counters::default(),
                hosts: Mutex::new(HashMap::new()),
                input,
            }),
        };

        tokio::spawn(dispatcher.clone().route(commands, guard));
        dispatcher
    }

    /// Submit a command. Never waits, however busy the command's host is.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::EmptyHost`] if the command's URL has no host
    /// - [`ErrorKind::QueueClosed`] if [`Dispatcher::close`] or
    ///   [`Dispatcher::cancel`] has been called
    pub fn send(&self, command: Command) -> Result<()> {
        let host = command.host_key()?;
        if !self.shared.lifecycle.is_open() {
            return Err(ErrorKind::QueueClosed);
        }

        self.shared
            .input
            .send(Message::Command(host, command))
            .map_err(|_| ErrorKind::QueueClosed)?;
        self.shared.counters.record_accepted();
        Ok(())
    }

    /// Submit a `GET` command for each URL.
    ///
    /// Returns the number of commands submitted. Submission stops at the
    /// first URL which cannot be parsed or sent; that error is returned
    /// alongside the count.
    pub fn send_get<I>(&self, urls: I) -> (usize, Result<()>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.send_with_method(&Method::GET, urls)
    }

    /// Submit a `HEAD` command for each URL, see [`Dispatcher::send_get`]
    pub fn send_head<I>(&self, urls: I) -> (usize, Result<()>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.send_with_method(&Method::HEAD, urls)
    }

    fn send_with_method<I>(&self, method: &Method, urls: I) -> (usize, Result<()>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut sent = 0;
        for url in urls {
            let result =
                Command::parse(method.clone(), url.as_ref()).and_then(|command| self.send(command));
            if let Err(e) = result {
                return (sent, Err(e));
            }
            sent += 1;
        }
        (sent, Ok(()))
    }

    /// Stop accepting commands, execute everything already submitted and
    /// wait for all host workers to finish.
    ///
    /// Only the first call does this; any other call returns right away.
    /// Must not be awaited from within a [`Handler`]: the handler's own
    /// worker would never finish. Spawn a task instead.
    ///
    /// The shutdown runs in its own task, so dropping the returned future
    /// early doesn't stop it; use [`Dispatcher::block`] to wait for it.
    pub async fn close(&self) {
        if self.shared.lifecycle.begin_close() {
            debug!("Closing dispatcher, draining host queues");
            tokio::spawn(self.clone().shutdown());
            self.block().await;
        }
    }

    /// Stop accepting commands and abandon everything which hasn't started
    /// executing yet. Requests already in flight finish and reach their
    /// handler; pending crawl delays are cut short.
    ///
    /// Cancelling a dispatcher which is already closing makes the close
    /// finish early.
    pub async fn cancel(&self) {
        if self.shared.lifecycle.begin_cancel() {
            debug!("Cancelling dispatcher");
            tokio::spawn(self.clone().shutdown());
            self.block().await;
        }
    }

    /// Wait until the dispatcher has been shut down completely
    pub async fn block(&self) {
        self.shared.lifecycle.wait_done().await;
    }

    /// Whether the dispatcher stopped accepting commands
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.shared.lifecycle.is_open()
    }

    /// Whether [`Dispatcher::cancel`] has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.lifecycle.is_cancelled()
    }

    /// Hosts which currently have a worker
    #[must_use]
    pub fn active_hosts(&self) -> Vec<HostKey> {
        self.lock_hosts().keys().cloned().collect()
    }

    /// Counters describing the dispatcher's activity so far
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        self.shared.counters.snapshot()
    }

    /// Drain and finish. Only the winner of the lifecycle transition gets
    /// here, and the wait group makes sure the drain runs once regardless.
    async fn shutdown(self) {
        let Some(waiter) = self.shared.lifecycle.take_waiter() else {
            return;
        };
        self.shared.counters.record_drain();

        if self.shared.input.send(Message::Shutdown).is_err() {
            trace!("Routing task is already gone");
        }
        waiter.wait().await;
        self.shared.lifecycle.finish();
        debug!("Dispatcher closed");
    }

    fn lock_hosts(&self) -> MutexGuard<'_, HashMap<HostKey, HostEntry>> {
        self.shared
            .hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The routing task. Holds the first wait guard and hands clones of it
    /// to the workers it spawns.
    async fn route(self, mut commands: mpsc::UnboundedReceiver<Message>, guard: WaitGuard) {
        let cancel = self.shared.lifecycle.cancel_signal();

        while let Some(message) = commands.recv().await {
            match message {
                Message::Command(host, command) => {
                    if cancel.is_cancelled() {
                        trace!("Dropping {command}, dispatcher was cancelled");
                        continue;
                    }
                    self.hand_off(host, command, &guard).await;
                }
                Message::Retire {
                    host,
                    generation,
                    received,
                } => self.retire(&host, generation, received),
                // Commands submitted before this point are still buffered
                // and get routed before `recv` returns `None`
                Message::Shutdown => commands.close(),
            }
        }

        let queues = std::mem::take(&mut *self.lock_hosts());
        trace!("Closing {} host queue(s)", queues.len());
    }

    async fn hand_off(&self, host: HostKey, command: Command, guard: &WaitGuard) {
        let queue = {
            let mut hosts = self.lock_hosts();
            let entry = hosts
                .entry(host.clone())
                .or_insert_with(|| self.spawn_host(host, guard.clone()));
            entry.handed += 1;
            entry.queue.clone()
        };

        if let Err(e) = queue.send(command).await {
            trace!("Host queue is gone, dropping {}", e.0);
        }
    }

    fn spawn_host(&self, host: HostKey, guard: WaitGuard) -> HostEntry {
        let (queue, bridge_input) = mpsc::channel(1);
        let (bridge_output, commands) = mpsc::channel(1);
        let generation = self.shared.counters.record_spawn();
        debug!("Starting worker #{generation} for host {host}");

        tokio::spawn(bridge::run(bridge_input, bridge_output));
        tokio::spawn(HostWorker::new(host, generation, self.clone(), commands, guard).run());

        HostEntry {
            queue,
            generation,
            handed: 0,
        }
    }

    /// Ask the routing task to retire an idle worker
    pub(crate) fn request_retire(&self, host: &HostKey, generation: u64, received: u64) {
        let message = Message::Retire {
            host: host.clone(),
            generation,
            received,
        };
        if self.shared.input.send(message).is_err() {
            trace!("Dispatcher is shutting down, worker #{generation} for {host} exits with it");
        }
    }

    /// Remove an idle host from the table, closing its queue.
    ///
    /// Runs on the routing task only, so no command can be handed off
    /// concurrently. A worker which hasn't received everything handed to it
    /// yet is kept, and so is a newer worker for the same host.
    fn retire(&self, host: &HostKey, generation: u64, received: u64) {
        let remaining = {
            let mut hosts = self.lock_hosts();
            let drained = hosts
                .get(host)
                .filter(|entry| entry.generation == generation)
                .map(|entry| entry.handed == received);

            match drained {
                Some(true) => {
                    hosts.remove(host);
                }
                Some(false) => {
                    trace!("Worker #{generation} for {host} has commands on the way, keeping it");
                    return;
                }
                None => return,
            }
            hosts.len()
        };

        debug!("Retired worker #{generation} for {host}");
        if remaining == 0 && self.shared.settings.auto_close {
            debug!("No active hosts left, closing dispatcher");
            let dispatcher = self.clone();
            tokio::spawn(async move { dispatcher.close().await });
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lifecycle.state();
        f.debug_struct("Dispatcher")
            .field("state", &state)
            .field("cancelled", &self.is_cancelled())
            .field("closed", &(state == State::Closed))
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
