//! `pacer` is a library for fetching URLs politely.
//!
//! Commands are submitted to a [`Dispatcher`] without ever blocking. The
//! dispatcher routes them to one worker per host, which executes them one
//! at a time, in submission order, and waits for the crawl delay between
//! the end of one successful request and the start of the next. Different
//! hosts are fetched in parallel.
//!
//! ```no_run
//! use pacer_lib::{DispatcherBuilder, FnHandler, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let dispatcher = DispatcherBuilder::default().start(FnHandler::new(|ctx, result| {
//!     match result {
//!       Ok(response) => println!("[{}] {}", response.status(), ctx.command()),
//!       Err(e) => eprintln!("[ERR] {}: {e}", ctx.command()),
//!     }
//!   }))?;
//!
//!   dispatcher.send_get(["https://example.com/", "https://example.org/"]).1?;
//!   dispatcher.close().await;
//!   Ok(())
//! }
//! ```
//!
//! Requests can be customized per command with [`Command::builder`], and
//! per host through [`HostConfig`]. Whether a URL may be fetched at all can
//! be decided by a [`Policy`], for example one backed by `robots.txt`.
#![warn(missing_docs)]

mod builder;
mod handler;
mod policy;
mod transport;
mod types;

pub mod dispatch;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::DispatcherBuilder;
pub use dispatch::{
    DEFAULT_CRAWL_DELAY, DEFAULT_USER_AGENT, DEFAULT_WORKER_IDLE_TTL, DispatchConfig, Dispatcher,
    DispatcherStats, HostConfig, HostConfigs, HostKey,
};
pub use handler::{Context, FnHandler, Handler};
pub use policy::Policy;
pub use transport::Transport;
pub use types::*;
