use std::fmt::{self, Display};

use pacer_lib::DispatcherStats;
use serde::Serialize;

use crate::outcome::FetchOutcome;

// Maximum padding for each entry in the final statistics output
const MAX_PADDING: usize = 20;

#[derive(Debug, Default, Serialize)]
pub(crate) struct ResponseStats {
    total: usize,
    successful: usize,
    rejected: usize,
    errors: usize,
    /// Outcomes which didn't succeed, in the order they were handled
    failures: Vec<FetchOutcome>,
}

impl ResponseStats {
    pub(crate) fn add(&mut self, outcome: &FetchOutcome) {
        self.total += 1;

        if outcome.is_success() {
            self.successful += 1;
            return;
        }

        if outcome.status.is_some() {
            self.rejected += 1;
        } else {
            self.errors += 1;
        }
        self.failures.push(outcome.clone());
    }

    #[inline]
    pub(crate) const fn is_success(&self) -> bool {
        self.total == self.successful
    }
}

/// Everything reported at the end of a run
#[derive(Debug, Serialize)]
pub(crate) struct RunSummary {
    #[serde(flatten)]
    pub(crate) responses: ResponseStats,
    pub(crate) dispatcher: DispatcherStats,
}

fn write_stat(f: &mut fmt::Formatter, title: &str, stat: impl Display, newline: bool) -> fmt::Result {
    let fill = MAX_PADDING.saturating_sub(title.chars().count());
    write!(f, "{title}{stat:.>fill$}")?;

    if newline {
        f.write_str("\n")?;
    }

    Ok(())
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = "-".repeat(MAX_PADDING + 1);
        let responses = &self.responses;

        writeln!(f, "Summary")?;
        writeln!(f, "{separator}")?;
        write_stat(f, "Total", responses.total, true)?;
        write_stat(f, "Successful", responses.successful, true)?;
        write_stat(f, "Rejected", responses.rejected, true)?;
        write_stat(f, "Errors", responses.errors, true)?;
        write_stat(f, "Requests", self.dispatcher.requests, true)?;
        write_stat(f, "Host workers", self.dispatcher.workers_spawned, false)?;

        for failure in &responses.failures {
            // Using leading newlines over trailing ones (e.g. `writeln!`)
            // lets us avoid extra newlines without any additional logic.
            write!(f, "\n\n{failure}")?;
        }

        Ok(())
    }
}
