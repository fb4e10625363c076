//! Ties C1 (source adapter) through C4 (retention & emission) into one
//! serial pipeline per `spec.md` §5: a producer task feeds chunks over a
//! bounded channel to a single consumer task that owns the line
//! reassembler, parser and retention buffer, so `onBytes` is never
//! interleaved for a given watcher.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::config::{ParserConfig, Source, WatcherOpts};
use crate::error::ObservedError;
use crate::internal_events::{TracingEvents, WatcherInternalEvents};
use crate::parser::Parser;
use crate::reassemble::LineReassembler;
use crate::record::Record;
use crate::retention::{RetentionBuffer, REASON_STOPPED, REASON_SUCCESSOR, REASON_TIMER};
use crate::source::file::FileSource;
use crate::source::stream::StreamSource;
use crate::source::SourceEvent;

/// One event a subscriber (the `Reader`, or a caller observing the watcher
/// directly) receives: `spec.md` §6's `log`/`error` notifications.
#[derive(Debug, Clone)]
pub enum Notification {
    Log(Record),
    Error(ObservedError),
}

const BROADCAST_CAPACITY: usize = 1024;
const SOURCE_CHANNEL_CAPACITY: usize = 256;

enum RunningSource {
    File(FileSource),
    Stream(StreamSource),
}

struct Running {
    consumer: tokio::task::JoinHandle<()>,
    source: RunningSource,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Watches one source (`spec.md` §6). Construct, `start()`, observe `log`
/// and `error` notifications via [`Watcher::subscribe`], then `stop()`.
pub struct Watcher<E: WatcherInternalEvents = TracingEvents> {
    source_config: Source,
    parser: std::sync::Arc<Parser>,
    opts: WatcherOpts,
    events: E,
    broadcast_tx: broadcast::Sender<Notification>,
    running: Option<Running>,
}

impl Watcher<TracingEvents> {
    pub fn new(source: Source, parser: ParserConfig, opts: WatcherOpts) -> Self {
        Self::with_events(source, parser, opts, TracingEvents)
    }
}

impl<E: WatcherInternalEvents> Watcher<E> {
    pub fn with_events(source: Source, parser: ParserConfig, opts: WatcherOpts, events: E) -> Self {
        let (broadcast_tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        let mut watcher = Watcher {
            source_config: source,
            parser: std::sync::Arc::new(Parser::new(parser)),
            opts,
            events,
            broadcast_tx,
            running: None,
        };
        if watcher.opts.auto_start {
            watcher.start();
        }
        watcher
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.broadcast_tx.subscribe()
    }

    /// Idempotent (invariant I4): calling `start()` on an already-started
    /// watcher is a no-op.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        let (source_tx, source_rx) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let source = match &self.source_config {
            Source::File(path) => RunningSource::File(FileSource::spawn(
                path.clone(),
                self.opts.polling,
                self.opts.interval,
                self.events.clone(),
                source_tx,
            )),
            Source::Stream(stream) => {
                RunningSource::Stream(StreamSource::spawn(stream.clone(), source_tx))
            }
        };

        let consumer = tokio::spawn(run_consumer(
            source_rx,
            shutdown_rx,
            self.parser.clone(),
            self.opts.allow_pattern_violations,
            self.opts.retained_log_timeout,
            self.broadcast_tx.clone(),
            self.events.clone(),
        ));

        self.running = Some(Running {
            consumer,
            source,
            shutdown: Some(shutdown_tx),
        });
    }

    /// Stops the watcher, releasing the source and retention timer. Every
    /// record still retained at the moment of the call is flushed first
    /// (spec.md §8, "Retention completeness"). Idempotent.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        if let Some(shutdown) = running.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut running.consumer).await;
        match running.source {
            RunningSource::File(f) => f.stop(),
            RunningSource::Stream(s) => s.stop(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_consumer<E: WatcherInternalEvents>(
    mut source_rx: mpsc::Receiver<SourceEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
    parser: std::sync::Arc<Parser>,
    allow_pattern_violations: bool,
    retained_log_timeout: Duration,
    broadcast_tx: broadcast::Sender<Notification>,
    events: E,
) {
    let mut reassembler = LineReassembler::new();
    let mut retention = RetentionBuffer::new(parser.is_pattern_mode(), retained_log_timeout);
    let mut retention_deadline: Option<Instant> = None;

    loop {
        let sleep = async {
            match retention_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                for record in retention.drain_on_stop() {
                    events.emit_retention_flushed(REASON_STOPPED);
                    let _ = broadcast_tx.send(Notification::Log(record));
                }
                return;
            }

            maybe_event = source_rx.recv() => {
                let Some(event) = maybe_event else { return };
                match event {
                    SourceEvent::Bytes(chunk) => {
                        // Any arrival of new bytes cancels the pending
                        // timer (spec.md §4.4): a retained record that's
                        // still accumulating continuation lines should not
                        // be flushed just because its timer was ticking.
                        retention_deadline = None;
                        for line in reassembler.push(&chunk) {
                            handle_line(
                                &line,
                                &parser,
                                &mut retention,
                                allow_pattern_violations,
                                &mut retention_deadline,
                                retained_log_timeout,
                                &broadcast_tx,
                                &events,
                            );
                        }
                    }
                    SourceEvent::Error(e) => {
                        let _ = broadcast_tx.send(Notification::Error(ObservedError::Watch(e)));
                    }
                }
            }

            _ = sleep, if retention_deadline.is_some() => {
                retention_deadline = None;
                for record in retention.expire_timer() {
                    events.emit_retention_flushed(REASON_TIMER);
                    let _ = broadcast_tx.send(Notification::Log(record));
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_line<E: WatcherInternalEvents>(
    line: &str,
    parser: &Parser,
    retention: &mut RetentionBuffer,
    allow_pattern_violations: bool,
    retention_deadline: &mut Option<Instant>,
    retained_log_timeout: Duration,
    broadcast_tx: &broadcast::Sender<Notification>,
    events: &E,
) {
    match parser.parse(line) {
        Ok(Some(record)) => {
            let outcome = retention.push(record);
            for emitted in outcome.to_emit {
                events.emit_retention_flushed(REASON_SUCCESSOR);
                let _ = broadcast_tx.send(Notification::Log(emitted));
            }
            if outcome.arm_timer {
                *retention_deadline = Some(Instant::now() + retained_log_timeout);
            }
        }
        Ok(None) => {}
        Err(crate::error::ParseError::PatternViolation { raw_line })
            if allow_pattern_violations && parser.is_pattern_mode() && retention.has_retained() =>
        {
            if let Some(retained) = retention.retained_mut() {
                retained.append_to_last_field("\n", &raw_line);
            }
            events.emit_pattern_violation_appended(&raw_line);
        }
        Err(e) => {
            events.emit_parse_error(&e.to_string(), e.raw_line());
            let _ = broadcast_tx.send(Notification::Error(ObservedError::Parse(e)));
        }
    }
}
