//! C1 — the source adapter. Turns a [`crate::config::Source`] into a stream
//! of `onBytes`/`onError` deliveries for the line reassembler, per
//! `spec.md` §4.1.

pub mod file;
pub mod stream;

use crate::error::WatchError;

/// One delivery from a source adapter to the consumer pipeline.
#[derive(Debug)]
pub enum SourceEvent {
    Bytes(Vec<u8>),
    Error(WatchError),
}
