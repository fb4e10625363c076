//! Stream mode of C1: forwards an `AsyncRead`'s data deliveries verbatim.
//! No seeking, no size tracking (`spec.md` §4.1) — this is the mode used to
//! tail a child process's piped stdout/stderr.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Mutex};

use crate::error::WatchError;
use crate::source::SourceEvent;

const CHUNK_SIZE: usize = 8 * 1024;

pub struct StreamSource {
    task: tokio::task::JoinHandle<()>,
}

impl StreamSource {
    pub fn spawn(
        stream: Arc<Mutex<dyn tokio::io::AsyncRead + Send + Unpin>>,
        tx: mpsc::Sender<SourceEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let read = {
                    let mut guard = stream.lock().await;
                    guard.read(&mut buf).await
                };
                match read {
                    Ok(0) => break, // EOF: see SPEC_FULL.md open question #3.
                    Ok(n) => {
                        if tx.send(SourceEvent::Bytes(buf[..n].to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(SourceEvent::Error(WatchError {
                                path: std::path::PathBuf::new(),
                                message: e.to_string(),
                            }))
                            .await;
                        break;
                    }
                }
            }
        });
        StreamSource { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn forwards_chunks_until_eof() {
        let (tx, mut rx) = mpsc::channel(16);
        let stream: Arc<Mutex<dyn tokio::io::AsyncRead + Send + Unpin>> =
            Arc::new(Mutex::new(Cursor::new(b"hello world".to_vec())));
        let source = StreamSource::spawn(stream, tx);

        let mut collected = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                SourceEvent::Bytes(b) => collected.extend(b),
                SourceEvent::Error(_) => panic!("unexpected error"),
            }
        }
        assert_eq!(collected, b"hello world".to_vec());
        source.stop();
    }
}
