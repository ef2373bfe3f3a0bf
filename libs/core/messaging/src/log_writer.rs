//! Log fan-out to stderr and the `logs` topic.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_nats::jetstream::Context;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

use crate::LOGS_TOPIC;

/// A `MakeWriter` that duplicates every log line to stderr and the `logs`
/// bus topic.
///
/// The writer can be created before the broker connection exists so that
/// tracing is initialized first; lines queue in a channel until
/// [`BusLogWriter::attach`] hands them to a publishing task. The bus side
/// is best-effort: publish failures are dropped silently, so a broker
/// outage never stalls or aborts the operation that produced the record.
#[derive(Clone)]
pub struct BusLogWriter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>>,
}

impl BusLogWriter {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Start publishing queued and future log lines to the `logs` topic.
    /// Must be called from within a tokio runtime; a second call is a no-op.
    pub fn attach(&self, jetstream: Context) {
        let Some(mut rx) = self.rx.lock().expect("log writer lock poisoned").take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Ok(ack) = jetstream.publish(LOGS_TOPIC, line.into()).await {
                    let _ = ack.await;
                }
            }
        });
    }
}

impl Default for BusLogWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> MakeWriter<'a> for BusLogWriter {
    type Writer = BusLogGuard;

    fn make_writer(&'a self) -> Self::Writer {
        BusLogGuard {
            tx: self.tx.clone(),
            stderr: io::stderr(),
        }
    }
}

/// Per-event writer produced by [`BusLogWriter`].
pub struct BusLogGuard {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    stderr: io::Stderr,
}

impl Write for BusLogGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A closed channel means the publishing task is gone; stderr still
        // gets the line.
        let _ = self.tx.send(buf.to_vec());
        self.stderr.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stderr.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_reach_stderr_and_queue_before_attach() {
        let writer = BusLogWriter::new();
        let mut guard = writer.make_writer();

        let written = guard.write(b"{\"level\":\"info\"}\n").unwrap();
        assert_eq!(written, 17);

        // The line is queued for the bus even though nothing consumes yet.
        let mut rx = writer.rx.lock().unwrap().take().unwrap();
        assert_eq!(rx.try_recv().unwrap(), b"{\"level\":\"info\"}\n");
    }
}
