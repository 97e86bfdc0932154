//! Optional per-host admission hook, typically backed by `robots.txt`.
//!
//! The dispatcher doesn't fetch or parse `robots.txt` itself. A [`Policy`]
//! is consulted by each host worker right before a request is built; if it
//! refuses, the handler receives [`crate::ErrorKind::Disallowed`] and no
//! request is made.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::HostKey;

/// Decides which URLs may be fetched
#[async_trait]
pub trait Policy: Send + Sync {
    /// Whether `url` on `host` may be fetched
    async fn allowed(&self, host: &HostKey, url: &Url) -> bool;

    /// Crawl delay the host asks for, if any.
    ///
    /// It is only honored when it is longer than the configured delay.
    fn crawl_delay(&self, _host: &HostKey) -> Option<Duration> {
        None
    }
}
