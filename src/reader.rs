//! C5 — the reader. Wraps a [`Watcher`] 1:1, accumulates every record and
//! error it has ever seen, and answers `waitForMatch` against both the
//! already-buffered history and future notifications (`spec.md` §4.5).

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Notify};

use crate::config::{ParserConfig, Source, WaitOpts, WatcherOpts};
use crate::error::{ObservedError, WaitError};
use crate::internal_events::{TracingEvents, WatcherInternalEvents};
use crate::record::Record;
use crate::template::Template;
use crate::watcher::{Notification, Watcher};

#[derive(Default)]
struct History {
    /// Every `log`/`error` notification in the exact order the watcher
    /// dispatched it. Kept as one interleaved sequence, not two separate
    /// lists, so that "whichever is dispatched first wins" (`spec.md` §5)
    /// between a matching record and an upstream error can be decided by
    /// position alone — splitting into parallel `Vec<Record>`/
    /// `Vec<ObservedError>` would lose which of the two came first.
    timeline: Vec<Notification>,
    /// Set once the drain task observes the watcher's broadcast channel
    /// close (`stop()` was called). Lets an armed waiter distinguish "the
    /// source is gone" from "still waiting" without racing a second,
    /// independent broadcast subscription against this one (see
    /// `wait_for_match`).
    stopped: bool,
}

impl History {
    fn records(&self) -> impl Iterator<Item = &Record> {
        self.timeline.iter().filter_map(|n| match n {
            Notification::Log(r) => Some(r),
            Notification::Error(_) => None,
        })
    }

    fn errors(&self) -> impl Iterator<Item = &ObservedError> {
        self.timeline.iter().filter_map(|n| match n {
            Notification::Error(e) => Some(e),
            Notification::Log(_) => None,
        })
    }
}

/// Wraps a `Watcher`; see `spec.md` §4.5 for the full `waitForMatch`
/// semantics.
///
/// `wait_for_match` never opens its own subscription to the watcher's
/// broadcast channel. A single drain task owns the one subscription this
/// `Reader` ever holds, appends every notification to `history` under
/// `history`'s own lock, and wakes `notify` after each append; waiters
/// register interest (`notify.notified()`) and re-check `history` under the
/// same lock before ever awaiting, so a notification can never land in the
/// gap between "read the buffer" and "start listening for more" the way it
/// could with two independent broadcast subscriptions racing each other.
pub struct Reader<E: WatcherInternalEvents = TracingEvents> {
    watcher: Watcher<E>,
    history: Arc<Mutex<History>>,
    notify: Arc<Notify>,
    drain_task: Option<tokio::task::JoinHandle<()>>,
}

impl Reader<TracingEvents> {
    pub fn new(source: Source, parser: ParserConfig, opts: WatcherOpts) -> Self {
        Reader {
            watcher: Watcher::new(source, parser, opts),
            history: Arc::new(Mutex::new(History::default())),
            notify: Arc::new(Notify::new()),
            drain_task: None,
        }
    }
}

impl<E: WatcherInternalEvents> Reader<E> {
    pub fn with_events(source: Source, parser: ParserConfig, opts: WatcherOpts, events: E) -> Self {
        Reader {
            watcher: Watcher::with_events(source, parser, opts, events),
            history: Arc::new(Mutex::new(History::default())),
            notify: Arc::new(Notify::new()),
            drain_task: None,
        }
    }

    /// Calls `stop()` defensively, clears both buffers, then starts the
    /// underlying watcher and begins accumulating its notifications
    /// (spec.md §4.5).
    pub async fn start(&mut self) {
        self.stop().await;
        {
            let mut history = self.history.lock().unwrap();
            history.timeline.clear();
            history.stopped = false;
        }

        self.watcher.start();
        let mut rx = self.watcher.subscribe();
        let history = self.history.clone();
        let notify = self.notify.clone();
        self.drain_task = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(notification) => {
                        history.lock().unwrap().timeline.push(notification);
                        notify.notify_waiters();
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        history.lock().unwrap().stopped = true;
                        notify.notify_waiters();
                        return;
                    }
                }
            }
        }));
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.drain_task.take() {
            task.abort();
        }
        self.watcher.stop().await;
    }

    pub fn get_records(&self) -> Vec<Record> {
        self.history.lock().unwrap().records().cloned().collect()
    }

    pub fn get_errors(&self) -> Vec<ObservedError> {
        self.history.lock().unwrap().errors().cloned().collect()
    }

    /// `spec.md` §4.5. A `None`/empty template matches any record.
    pub async fn wait_for_match(&self, template: &Template, opts: &WaitOpts) -> Result<Record, WaitError> {
        self.events_for_wait().emit_waiter_armed(opts.timeout, opts.strict);

        let deadline = tokio::time::sleep(opts.timeout);
        tokio::pin!(deadline);

        // Index into `history.timeline` up to which this waiter has already
        // looked. `None` means "haven't taken the step-1/step-2 pass yet"
        // (spec.md §4.5: check errors, then scan the full buffer once,
        // before arming anything).
        let mut scanned: Option<usize> = None;

        loop {
            // Register for the next wakeup *before* inspecting state. Any
            // push the drain task makes from this point on is guaranteed to
            // wake this `notified` future, even if the push races the lock
            // acquisition just below — `Notify` records a push that lands
            // between this call and the first poll of `notified` rather
            // than discarding it.
            let notified = self.notify.notified();
            tokio::pin!(notified);

            {
                let history = self.history.lock().unwrap();

                if let Some(outcome) = self.scan_history(&history, template, opts, &mut scanned) {
                    return outcome;
                }
                if history.stopped {
                    self.events_for_wait().emit_waiter_completed("stopped");
                    return Err(WaitError::Stopped);
                }
            }

            tokio::select! {
                biased;

                _ = &mut deadline => {
                    self.events_for_wait().emit_waiter_completed("timeout");
                    return Err(WaitError::Timeout {
                        timeout: opts.timeout,
                        records: self.get_records(),
                    });
                }

                _ = notified => {}
            }
        }
    }

    /// Checks the portion of `history` this waiter has not yet scanned and
    /// returns `Some` the moment a terminal outcome is known; otherwise
    /// advances `scanned` past what was just looked at and returns `None` so
    /// the caller arms the timer/notification wait.
    fn scan_history(
        &self,
        history: &History,
        template: &Template,
        opts: &WaitOpts,
        scanned: &mut Option<usize>,
    ) -> Option<Result<Record, WaitError>> {
        match *scanned {
            None => {
                // Step 1: pre-existing errors fail immediately without
                // considering records, regardless of where they fall in the
                // timeline relative to any already-buffered record.
                let existing: Vec<String> = history.errors().map(|e| e.message()).collect();
                if !existing.is_empty() {
                    self.events_for_wait().emit_waiter_completed("upstream-error");
                    return Some(Err(WaitError::UpstreamError {
                        message: existing.join("\n"),
                    }));
                }

                // Step 2: scan the already-buffered records once, in full.
                let buffered: Vec<Record> = history.records().cloned().collect();
                let outcome = scan_buffered(&buffered, template, opts.strict);
                *scanned = Some(history.timeline.len());
                if let Some(outcome) = outcome {
                    self.events_for_wait().emit_waiter_completed(outcome_label(&outcome));
                    return Some(outcome);
                }
                None
            }
            Some(seen) => {
                // Step 3: walk new timeline entries in arrival order so a
                // match and an upstream error that both show up in this
                // wakeup resolve in the order they were actually dispatched
                // (spec.md §5: "whichever is dispatched first wins").
                for notification in &history.timeline[seen..] {
                    match notification {
                        Notification::Error(error) => {
                            self.events_for_wait().emit_waiter_completed("upstream-error");
                            return Some(Err(WaitError::UpstreamError {
                                message: error.message(),
                            }));
                        }
                        Notification::Log(record) => {
                            if template.matches(record) {
                                self.events_for_wait().emit_waiter_completed("matched");
                                return Some(Ok(record.clone()));
                            } else if opts.strict {
                                self.events_for_wait().emit_waiter_completed("unexpected-record");
                                return Some(Err(WaitError::UnexpectedRecord {
                                    record: record.clone(),
                                }));
                            }
                        }
                    }
                }
                *scanned = Some(history.timeline.len());
                None
            }
        }
    }

    fn events_for_wait(&self) -> &TracingEvents {
        // Waiter telemetry always goes through `tracing` directly; a
        // caller-injected `WatcherInternalEvents` governs watch-pipeline
        // events (see `watcher::Watcher`), not wait-specific ones, since a
        // single `Reader` may have many concurrent waiters.
        &TRACING
    }
}

static TRACING: TracingEvents = TracingEvents;

fn scan_buffered(
    records: &[Record],
    template: &Template,
    strict: bool,
) -> Option<Result<Record, WaitError>> {
    if strict {
        return records.first().map(|first| {
            if template.matches(first) {
                Ok(first.clone())
            } else {
                Err(WaitError::UnexpectedRecord {
                    record: first.clone(),
                })
            }
        });
    }
    records
        .iter()
        .find(|r| template.matches(r))
        .cloned()
        .map(Ok)
}

fn outcome_label(outcome: &Result<Record, WaitError>) -> &'static str {
    match outcome {
        Ok(_) => "matched",
        Err(WaitError::UnexpectedRecord { .. }) => "unexpected-record",
        Err(_) => "error",
    }
}

impl<E: WatcherInternalEvents> Drop for Reader<E> {
    fn drop(&mut self) {
        if let Some(task) = self.drain_task.take() {
            task.abort();
        }
    }
}
