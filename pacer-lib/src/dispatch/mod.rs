//! Per-host serialized, paced execution of commands.
//!
//! # Architecture
//!
//! - [`Dispatcher`]: accepts commands and routes them to their host
//! - a bridge per host: unbounded FIFO so routing never waits on a busy host
//! - a worker per host: executes the host's commands one at a time, keeping
//!   the crawl delay between successful requests
//! - [`HostKey`]: the serialization key of a command
//! - [`DispatchConfig`] and [`HostConfig`]: settings and per-host overrides
//!
//! Bridges and workers are created when the first command for a host shows
//! up and torn down after the host has been idle for the configured time.

mod bridge;
mod config;
mod dispatcher;
mod key;
mod lifecycle;
mod request;
mod stats;
mod waiter;
mod worker;

pub use config::{
    DEFAULT_CRAWL_DELAY, DEFAULT_USER_AGENT, DEFAULT_WORKER_IDLE_TTL, DispatchConfig, HostConfig,
    HostConfigs,
};
pub use dispatcher::Dispatcher;
pub(crate) use dispatcher::Settings;
pub use key::HostKey;
pub use stats::DispatcherStats;
