//! `pacer` fetches URLs politely.
//!
//! Requests to the same host are made one at a time, in the order given,
//! with a crawl delay between the end of one successful request and the
//! start of the next. Different hosts are fetched in parallel.
//!
//! The pacer binary is a wrapper around pacer-lib, which provides the
//! dispatcher doing the actual work.
//!
//! Fetch a few pages:
//! ```sh
//! pacer https://example.com/ https://example.com/about https://example.org/
//! ```
//!
//! Read URLs from standard input and only ask for headers:
//! ```sh
//! cat urls.txt | pacer --method head -
//! ```
//!
//! Wait at least two seconds between requests to the same host:
//! ```sh
//! pacer --crawl-delay 2s https://example.com/a https://example.com/b
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Error, Result, bail};
use clap::Parser;
use formatters::log::init_logging;
use http::{HeaderMap, Method};
use log::{error, info, warn};
use pacer_lib::{Command, Dispatcher, DispatcherBuilder, FnHandler};
use url::Url;

use options::HeaderMapExt;

mod formatters;
mod options;
mod outcome;
mod stats;
mod verbosity;

use crate::{
    formatters::{get_outcome_formatter, outcome::OutcomeFormatter},
    options::{Config, PACER_CONFIG_FILE, PacerOptions},
    outcome::FetchOutcome,
    stats::{ResponseStats, RunSummary},
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    FetchFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<PacerOptions> {
    let mut opts = PacerOptions::parse();

    init_logging(&opts.config.verbose);

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // If no config file was explicitly provided, we try to load the default
        // config file from the current directory if the file exists. This will
        // raise an error if the file is invalid, just like the explicit provided
        // config file.
        let default_config = PathBuf::from(PACER_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    Ok(opts)
}

/// Set up runtime and call pacer entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!("Error while loading config: {e}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(io::ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Headers sent with every command, including basic auth
fn request_headers(config: &Config) -> Result<HeaderMap> {
    let mut headers = HeaderMap::from_header_pairs(&config.header)?;
    if let Some(credentials) = config.basic_auth()? {
        credentials.apply(&mut headers);
    }
    Ok(headers)
}

/// Fetch all URLs given on the command line or standard input
async fn run(opts: &PacerOptions) -> Result<i32> {
    let urls = opts.urls()?;
    if urls.is_empty() {
        warn!("No URLs to fetch");
        return Ok(ExitCode::Success as i32);
    }

    let method = opts.config.method()?;
    let headers = request_headers(&opts.config)?;
    let formatter: Arc<dyn OutcomeFormatter> = Arc::from(get_outcome_formatter(opts.config.format));
    let stats = Arc::new(Mutex::new(ResponseStats::default()));

    let handler = {
        let formatter = formatter.clone();
        let stats = stats.clone();
        FnHandler::new(move |ctx, result| {
            let outcome = FetchOutcome::new(&ctx, &result);
            print_outcome(formatter.as_ref(), &outcome);
            stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .add(&outcome);
        })
    };

    let dispatcher = DispatcherBuilder::from(opts.config.dispatch_config())
        .start(handler)
        .context("Cannot start the dispatcher")?;

    info!("Fetching {} URL(s)", urls.len());
    for raw in &urls {
        if let Err(outcome) = submit(&dispatcher, &method, &headers, raw) {
            print_outcome(formatter.as_ref(), &outcome);
            stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .add(&outcome);
        }
    }

    shutdown(&dispatcher).await;

    let responses = std::mem::take(&mut *stats.lock().unwrap_or_else(PoisonError::into_inner));
    let exit_code = if responses.is_success() {
        ExitCode::Success
    } else {
        ExitCode::FetchFailure
    };

    if opts.config.stats {
        let summary = RunSummary {
            responses,
            dispatcher: dispatcher.stats(),
        };
        writeln!(io::stderr(), "{}", formatter.format_summary(&summary)?)?;
    }

    Ok(exit_code as i32)
}

/// Submit one URL. A URL which can't be submitted is reported as a failed
/// outcome right away.
fn submit(
    dispatcher: &Dispatcher,
    method: &Method,
    headers: &HeaderMap,
    raw: &str,
) -> Result<(), FetchOutcome> {
    let url = Url::parse(raw).map_err(|e| {
        FetchOutcome::from_error(
            method.as_str(),
            raw,
            &pacer_lib::ErrorKind::InvalidUrl(raw.to_string(), e),
        )
    })?;

    let command = Command::builder()
        .url(url)
        .method(method.clone())
        .headers(headers.clone())
        .build();

    dispatcher
        .send(command)
        .map_err(|e| FetchOutcome::from_error(method.as_str(), raw, &e))
}

/// Close the dispatcher once everything has been fetched.
/// Ctrl-C abandons whatever hasn't started yet.
async fn shutdown(dispatcher: &Dispatcher) {
    let closing = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.close().await }
    });

    tokio::select! {
        _ = closing => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling outstanding requests");
            dispatcher.cancel().await;
            dispatcher.block().await;
        }
    }
}

fn print_outcome(formatter: &dyn OutcomeFormatter, outcome: &FetchOutcome) {
    // A closed stdout (e.g. `pacer ... | head`) is not worth a panic
    let _ = writeln!(io::stdout(), "{}", formatter.format_outcome(outcome));
}
