//! Incremental log tailing, parsing, and match-wait engine for test
//! harnesses that need to assert on a running process's log output without
//! polling a raw file by hand.
//!
//! The pipeline: a source adapter (file or stream) delivers raw byte chunks,
//! a line reassembler turns those into complete lines, an entry parser turns
//! each line into a [`Record`], and a retention buffer holds the most recent
//! pattern-mode record briefly in case a continuation line arrives. A
//! [`Watcher`] drives that whole pipeline and broadcasts `log`/`error`
//! notifications; [`Reader`] wraps a `Watcher` and adds `wait_for_match`, the
//! primary entry point for a test asserting "this line will appear".
//!
//! ```no_run
//! use logtap::{ParserConfig, Reader, Source, Template, WaitOpts, WatcherOpts};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = ParserConfig::pattern(
//!     r"^time=(\S+) \| msg=(.+)$",
//!     vec!["time".into(), "msg".into()],
//! )?;
//! let mut reader = Reader::new(Source::file("/var/log/app.log"), parser, WatcherOpts::default());
//! reader.start().await;
//!
//! let template = Template::new().with("msg", regex::Regex::new("started")?);
//! reader.wait_for_match(&template, &WaitOpts::default()).await?;
//! reader.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod internal_events;
mod metadata_ext;
mod parser;
mod reassemble;
mod record;
mod reader;
mod retention;
mod source;
mod template;
mod watcher;

pub use config::{CustomParseFn, ParserConfig, Source, WaitOpts, WatcherOpts};
pub use error::{ConfigError, ObservedError, ParseError, WaitError, WatchError};
pub use internal_events::{TracingEvents, WatcherInternalEvents};
pub use reader::Reader;
pub use record::{Record, Value};
pub use template::{Expected, Template};
pub use watcher::{Notification, Watcher};
