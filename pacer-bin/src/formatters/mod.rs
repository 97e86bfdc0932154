pub(crate) mod log;
pub(crate) mod outcome;

use self::outcome::OutcomeFormatter;
use crate::options::OutputFormat;

/// Create an outcome formatter based on the given format option
pub(crate) fn get_outcome_formatter(format: OutputFormat) -> Box<dyn OutcomeFormatter> {
    match format {
        OutputFormat::Plain => Box::new(outcome::PlainFormatter),
        OutputFormat::Json => Box::new(outcome::JsonFormatter),
    }
}
