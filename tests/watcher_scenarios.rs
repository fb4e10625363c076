//! End-to-end scenarios against a real temp file, one per literal scenario
//! described for this pipeline. Polling mode is used throughout so these
//! tests don't depend on the host's filesystem notification backend.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use logtap::{Notification, ObservedError, ParseError, ParserConfig, Source, Template, WatcherOpts};
use tempfile::NamedTempFile;

fn append(path: &Path, line: &str) {
    let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    writeln!(f, "{line}").unwrap();
}

fn polling_opts(retained_log_timeout: Duration) -> WatcherOpts {
    WatcherOpts {
        auto_start: false,
        polling: true,
        interval: Duration::from_millis(20),
        allow_pattern_violations: false,
        retained_log_timeout,
    }
}

#[tokio::test]
async fn pattern_parse_single_record() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let file = NamedTempFile::new().unwrap();
    let parser = ParserConfig::pattern(
        r"^time=(\S+) \| msg=(.+) \| foo=(\d+)$",
        vec!["time".into(), "msg".into(), "foo".into()],
    )
    .unwrap();

    let mut watcher = logtap::Watcher::new(
        Source::file(file.path()),
        parser,
        polling_opts(Duration::from_millis(300)),
    );
    let mut rx = watcher.subscribe();
    watcher.start();

    append(
        file.path(),
        "time=2015-06-18T11:47:46.983Z | msg=Lorem ipsum | foo=3",
    );

    let notification = tokio::time::timeout(Duration::from_millis(1000), rx.recv())
        .await
        .expect("a notification within 1s")
        .unwrap();

    match notification {
        Notification::Log(record) => {
            let mut expected = logtap::Record::new();
            expected.insert("time", "2015-06-18T11:47:46.983Z".to_owned());
            expected.insert("msg", "Lorem ipsum".to_owned());
            expected.insert("foo", "3".to_owned());
            similar_asserts::assert_eq!(record, expected);
        }
        Notification::Error(e) => panic!("unexpected error: {e:?}"),
    }

    watcher.stop().await;
}

#[tokio::test]
async fn retention_across_incomplete_write() {
    let file = NamedTempFile::new().unwrap();
    let parser = ParserConfig::pattern(r"^msg=(.+)$", vec!["msg".into()]).unwrap();

    let mut watcher = logtap::Watcher::new(
        Source::file(file.path()),
        parser,
        polling_opts(Duration::from_millis(300)),
    );
    let mut rx = watcher.subscribe();
    watcher.start();

    let started = tokio::time::Instant::now();
    append(file.path(), "msg=record A");

    let notification = tokio::time::timeout(Duration::from_millis(2000), rx.recv())
        .await
        .expect("exactly one notification within 2s")
        .unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed >= Duration::from_millis(250),
        "record A should not be emitted before the retention timer elapses, got {elapsed:?}"
    );
    match notification {
        Notification::Log(record) => {
            assert_eq!(record.get("msg").unwrap().as_match_text(), "record A");
        }
        Notification::Error(e) => panic!("unexpected error: {e:?}"),
    }

    // Nothing else should follow.
    let second = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(second.is_err(), "no second notification expected");

    watcher.stop().await;
}

#[tokio::test]
async fn multi_line_with_allow_pattern_violations() {
    let file = NamedTempFile::new().unwrap();
    let parser = ParserConfig::pattern(r"^msg=(.+)$", vec!["msg".into()]).unwrap();

    let mut opts = polling_opts(Duration::from_millis(300));
    opts.allow_pattern_violations = true;
    let mut watcher = logtap::Watcher::new(Source::file(file.path()), parser, opts);
    let mut rx = watcher.subscribe();
    watcher.start();

    append(file.path(), "msg=record A");
    tokio::time::sleep(Duration::from_millis(60)).await;
    append(file.path(), "stack trace line 1");
    append(file.path(), "stack trace line 2");
    tokio::time::sleep(Duration::from_millis(60)).await;
    append(file.path(), "msg=record B");

    let first = tokio::time::timeout(Duration::from_millis(2000), rx.recv())
        .await
        .expect("record A within 2s")
        .unwrap();
    match first {
        Notification::Log(record) => {
            assert_eq!(
                record.get("msg").unwrap().as_match_text(),
                "record A\nstack trace line 1\nstack trace line 2"
            );
        }
        Notification::Error(e) => panic!("unexpected error: {e:?}"),
    }

    watcher.stop().await; // flushes record B, still retained awaiting a successor

    let second = rx.try_recv().expect("record B should have been flushed by stop()");
    match second {
        Notification::Log(record) => {
            assert_eq!(record.get("msg").unwrap().as_match_text(), "record B");
        }
        Notification::Error(e) => panic!("unexpected error: {e:?}"),
    }
}

#[tokio::test]
async fn structured_document_schema_violation() {
    let file = NamedTempFile::new().unwrap();
    let schema = serde_json::json!({
        "type": "object",
        "required": ["foo"],
        "properties": { "foo": { "type": "number" } }
    });
    let parser = ParserConfig::json_with_schema(&schema).unwrap();

    let mut watcher =
        logtap::Watcher::new(Source::file(file.path()), parser, polling_opts(Duration::from_millis(300)));
    let mut rx = watcher.subscribe();
    watcher.start();

    append(file.path(), r#"{"foo": "not-a-number"}"#);

    let notification = tokio::time::timeout(Duration::from_millis(1000), rx.recv())
        .await
        .expect("one notification within 1s")
        .unwrap();

    match notification {
        Notification::Error(ObservedError::Parse(ParseError::SchemaViolation { .. })) => {}
        other => panic!("expected a schema-violation error, got {other:?}"),
    }

    let second = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(second.is_err(), "no log notification expected");

    watcher.stop().await;
}

#[tokio::test]
async fn retention_completeness_on_stop() {
    // Every record is either emitted or still retained at the moment
    // stop() is called; none should ever be silently lost.
    let file = NamedTempFile::new().unwrap();
    let parser = ParserConfig::pattern(r"^msg=(.+)$", vec!["msg".into()]).unwrap();

    let mut watcher = logtap::Watcher::new(
        Source::file(file.path()),
        parser,
        polling_opts(Duration::from_secs(10)), // long enough that the timer never fires
    );
    let mut rx = watcher.subscribe();
    watcher.start();

    append(file.path(), "msg=only record");
    tokio::time::sleep(Duration::from_millis(100)).await;

    watcher.stop().await;

    let notification = rx
        .try_recv()
        .expect("the retained record must be flushed by stop(), not lost");
    match notification {
        Notification::Log(record) => {
            assert_eq!(record.get("msg").unwrap().as_match_text(), "only record");
        }
        Notification::Error(e) => panic!("unexpected error: {e:?}"),
    }
}

#[test]
fn template_matches_its_own_source_record() {
    let mut record = logtap::Record::new();
    record.insert("foo", "bar".to_owned());
    record.insert("baz", "3".to_owned());

    let template = record
        .fields()
        .fold(Template::new(), |t, (k, v)| t.with(k, v.clone()));
    assert!(template.matches(&record));
}
