use crate::verbosity::Verbosity;
use anyhow::{Context, Error, Result, anyhow};
use clap::{Parser, ValueEnum, builder::TypedValueParser};
use http::{
    HeaderMap, Method,
    header::{HeaderName, HeaderValue},
};
use pacer_lib::{
    BasicAuthCredentials, DEFAULT_CRAWL_DELAY, DEFAULT_USER_AGENT, DEFAULT_WORKER_IDLE_TTL,
    DispatchConfig, HostConfigs,
};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::io::{self, BufRead};
use std::{fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

pub(crate) const PACER_CONFIG_FILE: &str = "pacer.toml";

/// Lines starting with this marker are ignored when reading URLs
const COMMENT_MARKER: &str = "#";

const DEFAULT_METHOD: &str = "get";

// this exists because clap requires `&str` type values for defaults
// whereas serde expects `Duration` values
const CRAWL_DELAY_STR: &str = "5s";
const WORKER_IDLE_TTL_STR: &str = "30s";

/// The format used to print fetch outcomes
#[derive(Debug, Deserialize, Default, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OutputFormat {
    /// One line per URL: `[status] METHOD url`
    #[default]
    Plain,
    /// One JSON object per URL
    Json,
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    crawl_delay: Duration = DEFAULT_CRAWL_DELAY;
    worker_idle_ttl: Duration = DEFAULT_WORKER_IDLE_TTL;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    method: String = DEFAULT_METHOD.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Parse a single header into a [`HeaderName`] and [`HeaderValue`]
///
/// Headers are expected to be in format `Header-Name: Header-Value`.
/// The header name and value are trimmed of whitespace.
///
/// # Errors
///
/// This fails if the header does not contain a `:` character or if the
/// name or value are not valid in a header.
fn parse_single_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = header.split_once(':') else {
        return Err(anyhow!(
            "Invalid header format. Expected colon-separated string in the format 'HeaderName: HeaderValue'"
        ));
    };

    let name = name.trim();
    let name = HeaderName::from_str(name)
        .map_err(|e| anyhow!("Unable to convert header name '{name}': {e}"))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| anyhow!("Unable to read value of header with name '{name}': {e}"))?;
    Ok((name, value))
}

/// Parses a single HTTP header into a tuple of (String, String)
#[derive(Clone, Debug)]
struct HeaderParser;

impl TypedValueParser for HeaderParser {
    type Value = (String, String);

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let header_str = value.to_str().ok_or_else(|| {
            clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                "Header value contains invalid UTF-8",
            )
        })?;

        match parse_single_header(header_str) {
            Ok((name, value)) => {
                let Ok(value) = value.to_str() else {
                    return Err(clap::Error::raw(
                        clap::error::ErrorKind::InvalidValue,
                        "Header value contains invalid UTF-8",
                    ));
                };

                Ok((name.to_string(), value.to_string()))
            }
            Err(e) => Err(clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                e.to_string(),
            )),
        }
    }
}

impl clap::builder::ValueParserFactory for HeaderParser {
    type Parser = HeaderParser;
    fn value_parser() -> Self::Parser {
        HeaderParser
    }
}

/// Extension trait for converting a Vec of header pairs to a `HeaderMap`
pub(crate) trait HeaderMapExt {
    /// Convert a collection of header key-value pairs to a `HeaderMap`
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error>;
}

impl HeaderMapExt for HeaderMap {
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("Invalid header name '{name}': {e}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("Invalid header value '{value}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

/// pacer fetches URLs politely: requests to the same host are made one at a
/// time, in order, with a crawl delay between them. Different hosts are
/// fetched in parallel.
///
/// pacer is powered by pacer-lib, the Rust library for paced fetching.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct PacerOptions {
    /// URLs to fetch.
    #[arg(
        name = "urls",
        long_help = "URLs to fetch. Use `-` (or pass no URL at all) to read them from
standard input, one per line. Empty lines and lines starting with '#' are ignored."
    )]
    raw_urls: Vec<String>,

    /// Configuration file to use
    #[arg(
        short,
        long = "config",
        long_help = "Configuration file to use

[default: pacer.toml]"
    )]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl PacerOptions {
    /// All URLs to fetch, with `-` expanded to the lines of standard input
    pub(crate) fn urls(&self) -> Result<Vec<String>> {
        let stdin = io::stdin();
        self.urls_from(stdin.lock())
    }

    fn urls_from(&self, mut stdin: impl BufRead) -> Result<Vec<String>> {
        if self.raw_urls.is_empty() {
            return read_urls(&mut stdin);
        }

        let mut urls = Vec::with_capacity(self.raw_urls.len());
        for raw in &self.raw_urls {
            if raw == "-" {
                urls.extend(read_urls(&mut stdin)?);
            } else {
                urls.push(raw.clone());
            }
        }
        Ok(urls)
    }
}

/// Read URLs line by line; ignore empty lines and comments
fn read_urls(reader: &mut impl BufRead) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line.context("Cannot read URLs from standard input")?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with(COMMENT_MARKER) {
            urls.push(line.to_string());
        }
    }
    Ok(urls)
}

// Custom deserializer function for the header field
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

/// The main configuration for pacer
#[derive(Parser, Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Request method to use, `get` or `head`
    #[arg(short = 'X', long, default_value = DEFAULT_METHOD)]
    #[serde(default = "method")]
    pub(crate) method: String,

    /// Minimum time between the end of a successful request and the start of
    /// the next one to the same host, e.g. `500ms`, `5s` or `1m`
    #[arg(long, value_parser = humantime::parse_duration, default_value = CRAWL_DELAY_STR)]
    #[serde(default = "crawl_delay", with = "humantime_serde")]
    pub(crate) crawl_delay: Duration,

    /// Time a host stays without requests before its worker shuts down
    #[arg(long, value_parser = humantime::parse_duration, default_value = WORKER_IDLE_TTL_STR)]
    #[serde(default = "worker_idle_ttl", with = "humantime_serde")]
    pub(crate) worker_idle_ttl: Duration,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Timeout of a single request, e.g. `20s`
    #[arg(short, long, value_parser = humantime::parse_duration)]
    #[serde(default, with = "humantime_serde")]
    pub(crate) timeout: Option<Duration>,

    /// Set custom header for requests
    #[arg(
        short = 'H',
        long = "header",
        value_parser = HeaderParser,
        value_name = "HEADER:VALUE",
        long_help = "Set custom header for requests

Some websites require custom headers to be passed in order to return valid responses.
You can specify custom headers in the format 'Name: Value'. For example, 'Accept: text/html'.
This is the same format that other tools like curl or wget use.
Multiple headers can be specified by using the flag multiple times."
    )]
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// Basic authentication credentials in the form `username:password`
    #[arg(long, value_name = "USERNAME:PASSWORD")]
    #[serde(default)]
    pub(crate) basic_auth: Option<String>,

    /// Output format of the fetch results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
    #[serde(default)]
    pub(crate) format: OutputFormat,

    /// Print a summary of the run to stderr
    #[arg(long)]
    #[serde(default)]
    pub(crate) stats: bool,

    /// Per-host overrides
    #[arg(skip)]
    #[serde(default)]
    pub(crate) hosts: HostConfigs,
}

impl Config {
    /// Special handling for merging headers
    ///
    /// Overwrites existing headers in `self` with the values from `other`.
    fn merge_headers(&mut self, other: &[(String, String)]) {
        let self_map = self.header.iter().cloned().collect::<HashMap<_, _>>();
        let other_map = other.iter().cloned().collect::<HashMap<_, _>>();

        // Merge the two maps, with `other` taking precedence
        let merged_map: HashMap<_, _> = self_map.into_iter().chain(other_map).collect();

        // Convert the merged map back to a Vec of tuples
        self.header = merged_map.into_iter().collect();
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // Special handling for headers before fold_in!
        self.merge_headers(&toml.header);

        // Hosts configuration is only available in TOML
        self.hosts = toml.hosts;

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,
                ..hosts,

                // Keys with defaults to assign
                basic_auth: None,
                crawl_delay: DEFAULT_CRAWL_DELAY,
                format: OutputFormat::Plain,
                method: DEFAULT_METHOD,
                stats: false,
                timeout: None,
                user_agent: DEFAULT_USER_AGENT,
                verbose: Verbosity::default(),
                worker_idle_ttl: DEFAULT_WORKER_IDLE_TTL,
            }
        }
    }

    /// The request method, `GET` or `HEAD`
    pub(crate) fn method(&self) -> Result<Method> {
        match self.method.to_lowercase().as_str() {
            "get" => Ok(Method::GET),
            "head" => Ok(Method::HEAD),
            other => Err(anyhow!("Unsupported method `{other}`, use `get` or `head`")),
        }
    }

    /// Parsed basic auth credentials, if any were given
    pub(crate) fn basic_auth(&self) -> Result<Option<BasicAuthCredentials>> {
        self.basic_auth
            .as_deref()
            .map(|raw| {
                BasicAuthCredentials::from_str(raw)
                    .map_err(|e| anyhow!("Invalid basic auth credentials: {e}"))
            })
            .transpose()
    }

    /// The dispatcher settings described by this configuration
    pub(crate) fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            crawl_delay: self.crawl_delay,
            worker_idle_ttl: self.worker_idle_ttl,
            user_agent: self.user_agent.clone(),
            // The binary closes explicitly once all URLs are submitted
            auto_close: false,
            timeout: self.timeout,
            hosts: self.hosts.clone(),
        }
    }
}
