//! Error taxonomy, per the three failure domains of the watch/parse/wait
//! pipeline. Kept as separate `snafu` enums rather than one flat error type
//! so callers can match the domain a failure came from without downcasting.

use std::path::PathBuf;

use snafu::Snafu;

use crate::record::Record;

/// Errors raised synchronously from a fallible constructor. These are fatal
/// — they never reach the `log`/`error` notification stream.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display(
        "unsupported parser configuration: exactly one of `pattern`, `json`, or `fn` must be set"
    ))]
    UnsupportedMethod,

    #[snafu(display("invalid pattern: {source}"))]
    InvalidPattern { source: regex::Error },

    #[snafu(display("pattern has {groups} capture groups but {names} field names were given"))]
    FieldNameMismatch { groups: usize, names: usize },

    #[snafu(display("invalid schema: {message}"))]
    InvalidSchema { message: String },
}

/// A single line failed to become a record. Surfaced as an `error`
/// notification; never aborts the watcher.
#[derive(Debug, Snafu, Clone)]
pub enum ParseError {
    #[snafu(display("line did not match configured pattern: {raw_line:?}"))]
    PatternViolation { raw_line: String },

    #[snafu(display("line is not valid JSON: {source_display} ({raw_line:?})"))]
    MalformedDocument {
        raw_line: String,
        source_display: String,
    },

    #[snafu(display("line failed schema validation: {detail} ({raw_line:?})"))]
    SchemaViolation { raw_line: String, detail: String },

    #[snafu(display("custom parse function failed: {message} ({raw_line:?})"))]
    CustomParseFailure { raw_line: String, message: String },
}

impl ParseError {
    pub fn raw_line(&self) -> &str {
        match self {
            ParseError::PatternViolation { raw_line }
            | ParseError::MalformedDocument { raw_line, .. }
            | ParseError::SchemaViolation { raw_line, .. }
            | ParseError::CustomParseFailure { raw_line, .. } => raw_line,
        }
    }

    /// Extra diagnostic detail beyond the human-readable message, as
    /// described in `spec.md` §3 ("Parse error").
    pub fn detail(&self) -> Option<&str> {
        match self {
            ParseError::SchemaViolation { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// An I/O failure from the source adapter, distinct from a parse error per
/// `spec.md` §3.
#[derive(Debug, Snafu, Clone)]
#[snafu(display("I/O error watching {path:?}: {message}"))]
pub struct WatchError {
    pub path: PathBuf,
    pub message: String,
}

/// Either half of what the reader accumulates, unified for transport on a
/// single notification stream while keeping each side's fields available to
/// a caller that matches on it.
#[derive(Debug, Clone)]
pub enum ObservedError {
    Parse(ParseError),
    Watch(WatchError),
}

impl ObservedError {
    pub fn message(&self) -> String {
        match self {
            ObservedError::Parse(e) => e.to_string(),
            ObservedError::Watch(e) => e.to_string(),
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ObservedError::Parse(e) => e.detail(),
            ObservedError::Watch(_) => None,
        }
    }
}

/// Failures a `waitForMatch` call can complete with.
#[derive(Debug, Snafu)]
pub enum WaitError {
    #[snafu(display("no matching record observed within {timeout:?}"))]
    Timeout {
        timeout: std::time::Duration,
        records: Vec<Record>,
    },

    #[snafu(display("strict mode: unexpected non-matching record observed"))]
    UnexpectedRecord { record: Record },

    #[snafu(display("upstream error(s) observed before a match: {message}"))]
    UpstreamError { message: String },

    #[snafu(display("the watcher was stopped while a match was still pending"))]
    Stopped,
}
