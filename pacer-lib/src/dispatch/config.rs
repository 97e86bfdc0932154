use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::dispatch::HostKey;

/// Default minimum spacing between successful requests to one host, 5 seconds.
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(5);

/// Default inactivity before a host worker is torn down, 30 seconds.
pub const DEFAULT_WORKER_IDLE_TTL: Duration = Duration::from_secs(30);

/// Default user agent, `pacer/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("pacer/", env!("CARGO_PKG_VERSION"));

/// Dispatcher-wide settings, as read from a configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum spacing between successful requests to the same host
    #[serde(with = "humantime_serde")]
    pub crawl_delay: Duration,

    /// Inactivity after which a host's worker and queue are torn down
    #[serde(with = "humantime_serde")]
    pub worker_idle_ttl: Duration,

    /// User agent applied to requests which don't set one
    pub user_agent: String,

    /// Shut the dispatcher down once no host is active anymore
    pub auto_close: bool,

    /// Timeout of a single request made by the default transport
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Per-host overrides
    pub hosts: HostConfigs,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            crawl_delay: DEFAULT_CRAWL_DELAY,
            worker_idle_ttl: DEFAULT_WORKER_IDLE_TTL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auto_close: false,
            timeout: None,
            hosts: HostConfigs::new(),
        }
    }
}

/// Per-host configuration overrides
pub type HostConfigs = HashMap<HostKey, HostConfig>;

/// Configuration for a specific host's pacing behavior
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Minimum spacing between successful requests to this host
    #[serde(default, with = "humantime_serde")]
    pub crawl_delay: Option<Duration>,

    /// Headers sent with every request to this host, unless the command
    /// sets the same header itself
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,
}

impl HostConfig {
    /// Get the effective crawl delay, falling back to the global default
    #[must_use]
    pub fn effective_crawl_delay(&self, global: Duration) -> Duration {
        self.crawl_delay.unwrap_or(global)
    }
}

/// Custom deserializer for headers from TOML config format
fn deserialize_headers<'de, D>(deserializer: D) -> Result<HeaderMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    let mut header_map = HeaderMap::new();

    for (name, value) in map {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("Invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(&value).map_err(|e| {
            serde::de::Error::custom(format!("Invalid header value '{value}': {e}"))
        })?;
        header_map.insert(header_name, header_value);
    }

    Ok(header_map)
}

/// Custom serializer for headers to TOML config format
fn serialize_headers<S>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let map: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
        .collect();
    map.serialize(serializer)
}
