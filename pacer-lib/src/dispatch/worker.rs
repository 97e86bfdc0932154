use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::{debug, trace, warn};
use reqwest::Response;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use super::lifecycle::CancelSignal;
use super::request::build_request;
use super::waiter::WaitGuard;
use super::{Dispatcher, HostKey};
use crate::{Command, Context, ErrorKind, Result};

/// Outcome of processing a single command
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Keep going. Carries the earliest start of the next request, if a
    /// crawl delay is owed.
    Continue(Option<Instant>),
    /// The dispatcher was cancelled before the command started
    Cancelled,
}

/// Executes the commands of a single host, one at a time.
///
/// The worker owns the pacing state of its host. Once it has been idle for
/// `worker_idle_ttl`, and no crawl delay is pending, it asks the routing
/// task to retire it and exits when its queue is closed.
pub(crate) struct HostWorker {
    host: HostKey,
    generation: u64,
    dispatcher: Dispatcher,
    commands: mpsc::Receiver<Command>,
    cancel: CancelSignal,
    _guard: WaitGuard,
}

impl HostWorker {
    pub(crate) fn new(
        host: HostKey,
        generation: u64,
        dispatcher: Dispatcher,
        commands: mpsc::Receiver<Command>,
        guard: WaitGuard,
    ) -> Self {
        let cancel = dispatcher.shared.lifecycle.cancel_signal();
        Self {
            host,
            generation,
            dispatcher,
            commands,
            cancel,
            _guard: guard,
        }
    }

    pub(crate) async fn run(mut self) {
        let idle_ttl = self.dispatcher.shared.settings.worker_idle_ttl;
        let mut ready_at: Option<Instant> = None;
        let mut received = 0;
        let mut retiring = false;

        loop {
            // A host which still owes a crawl delay keeps its worker
            let idle_at = Instant::now() + idle_ttl;
            let idle_at = ready_at.map_or(idle_at, |ready_at| ready_at.max(idle_at));

            let next = tokio::select! {
                command = self.commands.recv() => command,
                () = self.cancel.cancelled() => None,
                () = sleep_until(idle_at), if !retiring => {
                    debug!("Worker #{} for {} idle for {idle_ttl:?}, retiring", self.generation, self.host);
                    self.dispatcher.request_retire(&self.host, self.generation, received);
                    retiring = true;
                    continue;
                }
            };

            let Some(command) = next else {
                break;
            };
            // The routing task only retires this worker once it has
            // received everything handed to it, so a command arriving
            // now means the retirement was turned down
            received += 1;
            retiring = false;

            match self.process(command, ready_at).await {
                Step::Continue(next_ready) => ready_at = next_ready,
                Step::Cancelled => break,
            }
        }

        self.dispatcher.shared.counters.record_exit();
        debug!("Worker #{} for {} exited", self.generation, self.host);
    }

    async fn process(&mut self, command: Command, ready_at: Option<Instant>) -> Step {
        if self.cancel.is_cancelled() {
            trace!("Dropping {command}, dispatcher was cancelled");
            return Step::Cancelled;
        }

        if let Some(ready_at) = ready_at {
            tokio::select! {
                () = sleep_until(ready_at) => {}
                () = self.cancel.cancelled() => {}
            }
            // Cancellation may have raced with the end of the delay
            if self.cancel.is_cancelled() {
                trace!("Dropping {command}, dispatcher was cancelled during crawl delay");
                return Step::Cancelled;
            }
        }

        let shared = &self.dispatcher.shared;
        let mut delay = shared.settings.crawl_delay_for(&self.host);

        if let Some(policy) = &shared.policy {
            if !policy.allowed(&self.host, command.url()).await {
                debug!("Policy refused {command}");
                let url = command.url().clone();
                self.deliver(command, Err(ErrorKind::Disallowed(url))).await;
                return Step::Continue(None);
            }
            if let Some(required) = policy.crawl_delay(&self.host) {
                delay = delay.max(required);
            }
        }

        let request = match build_request(
            &command,
            shared.settings.headers_for(&self.host),
            &shared.settings.user_agent,
        ) {
            Ok(request) => request,
            Err(e) => {
                self.deliver(command, Err(e)).await;
                return Step::Continue(None);
            }
        };

        trace!("Executing {command}");
        let result = shared.transport.execute(request).await;
        shared.counters.record_request(result.is_ok());

        let succeeded = result.is_ok();
        self.deliver(command, result).await;

        // The delay runs from the end of the handler. Failed requests don't
        // owe the host a delay.
        Step::Continue(succeeded.then(|| Instant::now() + delay))
    }

    async fn deliver(&self, command: Command, result: Result<Response>) {
        let handler = command
            .handler()
            .cloned()
            .unwrap_or_else(|| self.dispatcher.shared.handler.clone());
        let ctx = Context::new(command, self.host.clone(), self.dispatcher.clone());

        if AssertUnwindSafe(handler.handle(ctx, result))
            .catch_unwind()
            .await
            .is_err()
        {
            warn!("Handler panicked on a command for {}", self.host);
        }
    }
}
