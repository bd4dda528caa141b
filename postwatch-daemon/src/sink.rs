//! Notification sink.
//!
//! [`LogLineSink`] receives completed delivery records from the tracker.
//! Every completion is logged at `debug`; records whose status changed
//! are announced as an `info` event and queued for [`write_lines`], which
//! writes them to an async writer (stdout in production). The tracker task
//! never blocks on output.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use postwatch_tracker::{CompletedRecord, CompletionSink};

/// Queues notification lines for the writer task.
pub struct LogLineSink {
    tx: mpsc::UnboundedSender<String>,
}

impl LogLineSink {
    /// Create a sink and the receiving end to pass to [`write_lines`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompletionSink for LogLineSink {
    fn on_completed(&mut self, record: &CompletedRecord, notify: bool) {
        tracing::debug!(
            id = %record.id,
            to = %record.to,
            status = %record.status,
            notify,
            "delivery record completed"
        );
    }

    fn emit_log_line(&mut self, line: &str) {
        tracing::info!(line, "delivery status changed");
        if self.tx.send(line.to_owned()).is_err() {
            tracing::warn!("notification writer stopped, dropping line");
        }
    }
}

/// Write queued notification lines until every sink is dropped.
///
/// Each line is followed by `\n` and flushed.
pub async fn write_lines<W>(mut lines: mpsc::UnboundedReceiver<String>, mut out: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
    }
    Ok(())
}
