use anyhow::{Context, Result};

use crate::outcome::FetchOutcome;
use crate::stats::RunSummary;

/// Turns fetch outcomes and the final summary into printable text
pub(crate) trait OutcomeFormatter: Send + Sync {
    /// Format a single outcome, printed as soon as it is handled
    fn format_outcome(&self, outcome: &FetchOutcome) -> String;

    /// Format the summary printed at the end of a run
    fn format_summary(&self, summary: &RunSummary) -> Result<String>;
}

/// `[200] GET https://example.com/`, one line per URL
pub(crate) struct PlainFormatter;

impl OutcomeFormatter for PlainFormatter {
    fn format_outcome(&self, outcome: &FetchOutcome) -> String {
        outcome.to_string()
    }

    fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        Ok(summary.to_string())
    }
}

/// One compact JSON object per line, and a pretty-printed summary
pub(crate) struct JsonFormatter;

impl OutcomeFormatter for JsonFormatter {
    fn format_outcome(&self, outcome: &FetchOutcome) -> String {
        // A struct of strings and integers always serializes
        serde_json::to_string(outcome).unwrap_or_default()
    }

    fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        serde_json::to_string_pretty(summary).context("Cannot format summary as JSON")
    }
}
