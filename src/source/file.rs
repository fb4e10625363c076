//! File mode of C1: change-notification (default) and polling submodes,
//! sharing one offset-safe read routine (`spec.md` §4.1).
//!
//! Change-notification mode watches the file's *parent directory*
//! non-recursively — exactly as `notify_watcher.rs` in `file-source` does —
//! so a file that does not exist yet at `start()` time is still picked up
//! on its `Create` event.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::internal_events::WatcherInternalEvents;
use crate::metadata_ext::PortableFileExt;
use crate::source::SourceEvent;

/// Tracks the byte range already delivered for one watched file.
struct OffsetState {
    /// `prevSize` in `spec.md` §4.1.
    previous_size: u64,
    /// `lastObservedSize`, used for the overlap clamp of invariant I2.
    last_observed_size: u64,
    /// (device, inode) at the last read; a change at the same path means
    /// the file was replaced out from under us (log rotation), distinct
    /// from truncation of the same file.
    identity: Option<(u64, u64)>,
    /// Whether `path` existed the last time it was stat'd. Lets
    /// `read_new_bytes` tell "still absent" apart from "just appeared" or
    /// "just disappeared" so `emit_file_discovered`/`emit_file_deleted`
    /// fire only on the transition, not on every poll/notify tick.
    present: bool,
}

impl OffsetState {
    fn at_start(path: &Path, events: &impl WatcherInternalEvents) -> Self {
        let metadata = fs::metadata(path).ok();
        let present = metadata.is_some();
        if present {
            events.emit_file_discovered(path);
        }
        let size = metadata.map(|m| m.len()).unwrap_or(0);
        OffsetState {
            previous_size: size,
            last_observed_size: size,
            identity: file_identity(path),
            present,
        }
    }
}

fn file_identity(path: &Path) -> Option<(u64, u64)> {
    let file = fs::File::open(path).ok()?;
    Some((file.portable_dev().ok()?, file.portable_ino().ok()?))
}

/// Re-stat `path` and read any newly appended bytes, applying the offset
/// safety clamp and rotation handling of `spec.md` §4.1.
///
/// Returns `Ok(None)` when the file is absent (not an error) or when the
/// clamp determined there is nothing new to read.
fn read_new_bytes(
    path: &Path,
    state: &mut OffsetState,
    events: &impl WatcherInternalEvents,
) -> Result<Option<Vec<u8>>, WatchError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if state.present {
                events.emit_file_deleted(path);
                state.present = false;
            }
            return Ok(None);
        }
        Err(e) => {
            return Err(WatchError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };
    if !state.present {
        events.emit_file_discovered(path);
        state.present = true;
    }
    let current_size = metadata.len();
    let current_identity = file_identity(path);

    // Open Question #2 of SPEC_FULL.md: treat shrinkage as rotation/truncation
    // rather than the documented-bug default of going silent until the file
    // grows past its old size. A changed (dev, ino) at the same path is the
    // same situation under a different name: whatever replaced the file we
    // had open is read from its own offset zero.
    let identity_changed = match (&state.identity, &current_identity) {
        (Some(prev), Some(curr)) => prev != curr,
        _ => false,
    };
    if identity_changed || current_size < state.last_observed_size {
        events.emit_file_rotated(path);
        state.previous_size = 0;
        state.last_observed_size = 0;
    }
    state.identity = current_identity;

    // I2: mask any overlap the underlying watch mechanism may have reported
    // by clamping forward, never backward.
    state.previous_size = state.previous_size.max(state.last_observed_size);
    if state.previous_size >= current_size {
        state.last_observed_size = current_size;
        return Ok(None);
    }

    let bytes = read_range(path, state.previous_size, current_size)
        .map_err(|e| WatchError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    state.previous_size = current_size;
    state.last_observed_size = current_size;
    Ok(Some(bytes))
}

fn read_range(path: &Path, start: u64, end: u64) -> std::io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; (end - start) as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Drives one file source for the lifetime of a `Watcher`. Owns the
/// `notify` watch handle (or polling interval) and is released entirely on
/// `stop()`, per `spec.md` §5 ("shared resources").
pub struct FileSource {
    task: tokio::task::JoinHandle<()>,
}

impl FileSource {
    pub fn spawn<E: WatcherInternalEvents>(
        path: PathBuf,
        polling: bool,
        interval: Duration,
        events: E,
        tx: mpsc::Sender<SourceEvent>,
    ) -> Self {
        let task = if polling {
            tokio::spawn(poll_loop(path, interval, events, tx))
        } else {
            tokio::spawn(notify_loop(path, events, tx))
        };
        FileSource { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

async fn poll_loop<E: WatcherInternalEvents>(
    path: PathBuf,
    interval: Duration,
    events: E,
    tx: mpsc::Sender<SourceEvent>,
) {
    let mut state = OffsetState::at_start(&path, &events);
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        deliver_once(&path, &mut state, &events, &tx).await;
    }
}

/// Bridges `notify`'s synchronous callback API into the async pipeline: a
/// dedicated OS thread owns the watcher and blocks on its channel, then
/// forwards each relevant directory event across an unbounded channel that
/// the async loop awaits on.
async fn notify_loop<E: WatcherInternalEvents>(
    path: PathBuf,
    events: E,
    tx: mpsc::Sender<SourceEvent>,
) {
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<()>();
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    // notify::Watcher must stay alive for the duration of the watch; move
    // it into the bridging thread along with its blocking receive loop.
    let bridge_path = path.clone();
    std::thread::spawn(move || {
        let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = match RecommendedWatcher::new(std_tx, notify::Config::default()) {
            Ok(w) => w,
            Err(_) => return,
        };
        if watcher.watch(&parent, RecursiveMode::NonRecursive).is_err() {
            return;
        }
        for res in std_rx {
            let relevant = match res {
                Ok(event) => is_relevant(&event, &bridge_path),
                Err(_) => false,
            };
            if relevant && notify_tx.send(()).is_err() {
                break;
            }
        }
    });

    // First check covers the case the file already existed (and has
    // content) at start() time, since we won't get a directory event for
    // bytes that are already there — the adapter still starts from the
    // size-at-start offset, it just needs one initial poke to notice files
    // created between `OffsetState::at_start` and the watch taking effect.
    let mut state = OffsetState::at_start(&path, &events);
    deliver_once(&path, &mut state, &events, &tx).await;

    while notify_rx.recv().await.is_some() {
        deliver_once(&path, &mut state, &events, &tx).await;
    }
}

fn is_relevant(event: &notify::Event, path: &Path) -> bool {
    use notify::EventKind;
    let kind_relevant = matches!(
        event.kind,
        EventKind::Modify(notify::event::ModifyKind::Data(_))
            | EventKind::Create(_)
            | EventKind::Modify(notify::event::ModifyKind::Name(_))
    );
    kind_relevant && event.paths.iter().any(|p| p == path)
}

async fn deliver_once<E: WatcherInternalEvents>(
    path: &Path,
    state: &mut OffsetState,
    events: &E,
    tx: &mpsc::Sender<SourceEvent>,
) {
    match read_new_bytes(path, state, events) {
        Ok(Some(bytes)) => {
            let _ = tx.send(SourceEvent::Bytes(bytes)).await;
        }
        Ok(None) => {}
        Err(e) => {
            events.emit_file_watch_error(path, &std::io::Error::other(e.message.clone()));
            let _ = tx.send(SourceEvent::Error(e)).await;
        }
    }
}
