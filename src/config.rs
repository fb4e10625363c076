//! Public configuration vocabulary (`spec.md` §6): the parser-selecting
//! `config` object, and the `opts` object governing watcher and wait
//! behaviour, each with the documented defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::error::{ConfigError, FieldNameMismatchSnafu, InvalidPatternSnafu};
use crate::record::Record;
use snafu::{ensure, ResultExt};

/// A caller-supplied line transform for custom mode. Returns `Ok(None)` to
/// ignore the line, `Ok(Some(record))` to emit it, `Err` to raise a
/// custom-parse-failure.
pub type CustomParseFn = Arc<dyn Fn(&str) -> Result<Option<Record>, String> + Send + Sync>;

/// Selects and configures exactly one of the three parser strategies. Built
/// via the constructors below rather than public fields so construction can
/// validate eagerly (`spec.md` §4.3: "any ambiguous or missing configuration
/// fails construction with unsupported method").
#[derive(Clone)]
pub enum ParserConfig {
    Pattern {
        pattern: Regex,
        field_names: Vec<String>,
    },
    Json {
        schema: Option<Arc<jsonschema::Validator>>,
    },
    Custom(CustomParseFn),
}

impl ParserConfig {
    pub fn pattern(pattern: &str, field_names: Vec<String>) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).context(InvalidPatternSnafu)?;
        let groups = compiled.captures_len().saturating_sub(1);
        ensure!(
            groups == field_names.len(),
            FieldNameMismatchSnafu {
                groups,
                names: field_names.len(),
            }
        );
        Ok(ParserConfig::Pattern {
            pattern: compiled,
            field_names,
        })
    }

    pub fn json() -> Self {
        ParserConfig::Json { schema: None }
    }

    pub fn json_with_schema(schema: &serde_json::Value) -> Result<Self, ConfigError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidSchema {
            message: e.to_string(),
        })?;
        Ok(ParserConfig::Json {
            schema: Some(Arc::new(validator)),
        })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Option<Record>, String> + Send + Sync + 'static,
    {
        ParserConfig::Custom(Arc::new(f))
    }
}

/// The kind of thing a `Watcher` tails.
#[derive(Clone)]
pub enum Source {
    /// A path on disk. Need not exist at construction time.
    File(PathBuf),
    /// Any readable async byte stream — a child process's piped stdout or
    /// stderr is the motivating case.
    Stream(Arc<tokio::sync::Mutex<dyn tokio::io::AsyncRead + Send + Unpin>>),
}

impl Source {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn stream(stream: impl tokio::io::AsyncRead + Send + Unpin + 'static) -> Self {
        Source::Stream(Arc::new(tokio::sync::Mutex::new(stream)))
    }
}

/// `opts` for `Watcher`/`Reader` construction (`spec.md` §6).
#[derive(Clone, Debug)]
pub struct WatcherOpts {
    /// Call `start()` from the constructor.
    pub auto_start: bool,
    /// File-mode polling rather than change-notification.
    pub polling: bool,
    /// Polling period.
    pub interval: Duration,
    /// Only meaningful in pattern mode: append pattern-violating lines to
    /// the last field of the previously retained record instead of raising
    /// a parse error.
    pub allow_pattern_violations: bool,
    /// How long a pattern-mode record is retained awaiting a successor
    /// before being emitted on its own.
    pub retained_log_timeout: Duration,
}

impl Default for WatcherOpts {
    fn default() -> Self {
        WatcherOpts {
            auto_start: false,
            polling: false,
            interval: Duration::from_millis(100),
            allow_pattern_violations: false,
            retained_log_timeout: Duration::from_millis(300),
        }
    }
}

/// `opts` for `Reader::wait_for_match` (`spec.md` §6).
#[derive(Clone, Debug)]
pub struct WaitOpts {
    pub timeout: Duration,
    pub strict: bool,
}

impl Default for WaitOpts {
    fn default() -> Self {
        WaitOpts {
            timeout: Duration::from_millis(3000),
            strict: false,
        }
    }
}
