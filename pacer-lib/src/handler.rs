//! Consumers of fetch outcomes.
//!
//! Every command accepted by a [`Dispatcher`] ends in exactly one call to a
//! [`Handler`], unless the dispatcher is cancelled first. The call happens on
//! the host worker of the command, so the next command for the same host
//! waits until the handler returns. Handlers must not block indefinitely.
//!
//! A handler which wants to close or cancel the dispatcher has to do it from
//! a spawned task: closing waits for all workers, including the one running
//! the handler.
//!
//! ```no_run
//! use pacer_lib::{Context, Dispatcher, Handler, Result};
//!
//! struct StopOnFirstError;
//!
//! #[async_trait::async_trait]
//! impl Handler for StopOnFirstError {
//!     async fn handle(&self, ctx: Context, result: Result<reqwest::Response>) {
//!         if result.is_err() {
//!             let dispatcher = ctx.dispatcher().clone();
//!             tokio::spawn(async move { dispatcher.cancel().await });
//!         }
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;
use reqwest::Response;

use crate::{Command, Dispatcher, HostKey, Result};

/// Receives the outcome of every executed command
#[async_trait]
pub trait Handler: Send + Sync {
    /// Called with the response, or the reason there is none.
    ///
    /// The response body is released once the handler returns, unless the
    /// handler moves the response somewhere else.
    async fn handle(&self, ctx: Context, result: Result<Response>);
}

/// Everything a handler may need besides the outcome itself
#[derive(Clone)]
pub struct Context {
    command: Command,
    host: HostKey,
    dispatcher: Dispatcher,
}

impl Context {
    pub(crate) const fn new(command: Command, host: HostKey, dispatcher: Dispatcher) -> Self {
        Self {
            command,
            host,
            dispatcher,
        }
    }

    /// The command this outcome belongs to
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// The host the command was serialized under
    #[must_use]
    pub const fn host(&self) -> &HostKey {
        &self.host
    }

    /// The dispatcher which executed the command.
    /// Use it to submit follow-up commands, or to close it from a spawned task.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("command", &self.command)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// A [`Handler`] made from a synchronous closure.
///
/// ```
/// use pacer_lib::FnHandler;
///
/// let handler = FnHandler::new(|ctx, result| match result {
///     Ok(response) => println!("[{}] {}", response.status(), ctx.command().url()),
///     Err(e) => eprintln!("[ERR] {}: {e}", ctx.command().url()),
/// });
/// ```
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(Context, Result<Response>) + Send + Sync,
{
    /// Wrap `f`
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(Context, Result<Response>) + Send + Sync,
{
    async fn handle(&self, ctx: Context, result: Result<Response>) {
        (self.0)(ctx, result);
    }
}
