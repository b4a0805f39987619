//! Relays child process output into the application log.
//!
//! Each stream is read in chunks of at most [`MAX_CHUNK`] bytes, split on
//! newlines, and handed to a [`LogSink`] with a label identifying the stream.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Upper bound on a single relayed chunk.
pub const MAX_CHUNK: usize = 64 * 1024;

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLabel {
    Stdout,
    Stderr,
}

impl StreamLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "STDOUT",
            Self::Stderr => "STDERR",
        }
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for relayed output lines.
pub trait LogSink: Send + Sync {
    fn write(&self, label: StreamLabel, line: &str);
}

/// Writes relayed output through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, label: StreamLabel, line: &str) {
        info!(target: "reai::container", stream = %label, "{line}");
    }
}

/// Reads `stream` until EOF or a read error, forwarding every chunk to `sink`.
///
/// Returns the number of chunks relayed.
pub async fn relay<R>(stream: R, label: StreamLabel, sink: &dyn LogSink) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(1024);
    let mut chunks = 0;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_CHUNK as u64)
            .read_until(b'\n', &mut buf)
            .await;

        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(trim_line_ending(&buf));
                sink.write(label, &line);
                chunks += 1;
            }
            Err(e) => {
                error!(stream = %label, error = %e, "error reading container output");
                break;
            }
        }
    }

    debug!(stream = %label, chunks, "finished capturing output");
    chunks
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// A set of relay tasks that can be awaited together.
#[derive(Default)]
pub struct RelayGroup {
    tasks: JoinSet<usize>,
}

impl RelayGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<R>(&mut self, stream: R, label: StreamLabel, sink: Arc<dyn LogSink>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.tasks
            .spawn(async move { relay(stream, label, sink.as_ref()).await });
    }

    /// Waits for every relay to reach end of stream. Returns the total
    /// number of chunks relayed.
    pub async fn wait(&mut self) -> usize {
        let mut total = 0;
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(chunks) => total += chunks,
                Err(e) => warn!(error = %e, "output relay task failed"),
            }
        }
        total
    }

    /// Like [`RelayGroup::wait`] but gives up after `limit`, aborting any
    /// relay still running. Returns true if every relay finished.
    pub async fn wait_timeout(&mut self, limit: Duration) -> bool {
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(_) => true,
            Err(_) => {
                warn!(timeout = ?limit, "output relays did not finish in time");
                self.tasks.abort_all();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<(StreamLabel, String)>>,
    }

    impl LogSink for Recorder {
        fn write(&self, label: StreamLabel, line: &str) {
            self.lines.lock().unwrap().push((label, line.to_string()));
        }
    }

    #[tokio::test]
    async fn relays_each_line() {
        let sink = Recorder::default();
        let input: &[u8] = b"loading model\r\nserver ready\npartial";
        let chunks = relay(input, StreamLabel::Stdout, &sink).await;

        assert_eq!(chunks, 3);
        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines[0], (StreamLabel::Stdout, "loading model".into()));
        assert_eq!(lines[1].1, "server ready");
        assert_eq!(lines[2].1, "partial");
    }

    #[tokio::test]
    async fn long_lines_are_split_into_bounded_chunks() {
        let sink = Recorder::default();
        let input = vec![b'x'; MAX_CHUNK + 10];
        let chunks = relay(input.as_slice(), StreamLabel::Stderr, &sink).await;

        assert_eq!(chunks, 2);
        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines[0].1.len(), MAX_CHUNK);
        assert_eq!(lines[1].1.len(), 10);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let sink = Recorder::default();
        let input: &[u8] = b"bad \xff byte\n";
        relay(input, StreamLabel::Stdout, &sink).await;
        assert_eq!(sink.lines.lock().unwrap()[0].1, "bad \u{fffd} byte");
    }

    #[tokio::test]
    async fn group_waits_for_all_streams() {
        let sink = Arc::new(Recorder::default());
        let mut group = RelayGroup::new();
        group.spawn(&b"a\nb\n"[..], StreamLabel::Stdout, sink.clone());
        group.spawn(&b"c\n"[..], StreamLabel::Stderr, sink.clone());

        assert!(group.wait_timeout(Duration::from_secs(5)).await);
        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines.iter().filter(|(l, _)| *l == StreamLabel::Stderr).count(),
            1
        );
    }

    #[test]
    fn labels_display() {
        assert_eq!(StreamLabel::Stdout.to_string(), "STDOUT");
        assert_eq!(StreamLabel::Stderr.to_string(), "STDERR");
    }
}
