//! Data-log sink adapter.
//!
//! Implements [`RecordSink`] with a bounded `embassy-sync` channel and one
//! writer thread that owns the output:
//!
//! ```text
//! ┌──────────┐ submit ┌─────────────────────────┐ receive ┌──────────────┐
//! │ pollers  │───────▶│ Channel<SinkMessage, 30>│────────▶│ writer thread│──▶ file
//! │controller│ (waits │                         │         │ write+flush  │
//! └──────────┘ if full)└─────────────────────────┘         └──────────────┘
//! ```
//!
//! Each record is written and flushed before the next is taken, so the file
//! order is the order in which submissions were accepted.  [`LogSink::close`]
//! queues a close marker behind whatever is pending, so nothing accepted
//! before close is lost.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future::block_on;
use log::{debug, error, warn};

use crate::app::events::LogRecord;
use crate::app::ports::RecordSink;
use crate::config::SINK_CAPACITY;
use crate::error::{Error, Result, SinkError};

enum SinkMessage {
    Record(LogRecord),
    Close,
}

type SinkChannel = Channel<CriticalSectionRawMutex, SinkMessage, SINK_CAPACITY>;

/// Single-writer, many-producer append log.
pub struct LogSink {
    channel: Arc<SinkChannel>,
    /// `true` once close has begun.  Producers hold the read side while
    /// enqueueing so close cannot slip a marker ahead of them.
    closed: RwLock<bool>,
    writer: Mutex<Option<JoinHandle<u64>>>,
}

impl LogSink {
    /// Open `path` for append (creating it) and start the writer.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Init(format!("log file {}: {e}", path.display())))?;
        Self::with_writer(file)
    }

    /// Start a writer thread that owns `out`.
    pub fn with_writer<W: Write + Send + 'static>(out: W) -> Result<Self> {
        let channel = Arc::new(SinkChannel::new());
        let writer = {
            let channel = Arc::clone(&channel);
            thread::Builder::new()
                .name("log-writer".into())
                .spawn(move || writer_loop(&channel, out))
                .map_err(|e| Error::Init(format!("log writer thread: {e}")))?
        };
        Ok(Self {
            channel,
            closed: RwLock::new(false),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Drain everything accepted so far, then stop the writer.
    /// Returns the number of records the writer wrote; `0` if already closed.
    pub fn close(&self) -> u64 {
        {
            let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return 0;
            }
            *closed = true;
        }

        let Some(writer) = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return 0;
        };

        block_on(self.channel.send(SinkMessage::Close));
        match writer.join() {
            Ok(written) => {
                debug!("log sink closed after {written} record(s)");
                written
            }
            Err(_) => {
                error!("log writer panicked");
                0
            }
        }
    }

    /// Enqueue `record`, waiting while the queue is full.
    pub fn try_submit(&self, record: LogRecord) -> core::result::Result<(), SinkError> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(SinkError::Closed);
        }
        block_on(self.channel.send(SinkMessage::Record(record)));
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSink for LogSink {
    fn submit(&self, record: LogRecord) {
        if let Err(e) = self.try_submit(record) {
            warn!("log sink {e}, record dropped");
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn writer_loop<W: Write>(channel: &SinkChannel, mut out: W) -> u64 {
    let mut written = 0u64;
    loop {
        match block_on(channel.receive()) {
            SinkMessage::Record(record) => match write_record(&mut out, &record) {
                Ok(()) => written += 1,
                Err(e) => error!("log write failed: {e}"),
            },
            SinkMessage::Close => break,
        }
    }
    written
}

fn write_record<W: Write>(out: &mut W, record: &LogRecord) -> io::Result<()> {
    writeln!(out, "{record}")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::{ControlEvent, EventKind};
    use crate::sensors::{Reading, Timestamp};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn ts() -> Timestamp {
        "2019.01.01_00:00:05".parse().unwrap()
    }

    #[test]
    fn writes_in_submission_order() {
        let buf = SharedBuf::default();
        let sink = LogSink::with_writer(buf.clone()).unwrap();
        sink.submit(ControlEvent::new(ts(), EventKind::StartingController).into());
        sink.submit(Reading::new(ts(), "s1", 20.5).into());
        assert_eq!(sink.close(), 2);
        assert_eq!(
            buf.text(),
            "2019.01.01_00:00:05 EVENT starting_controller\n2019.01.01_00:00:05 s1 20.5\n"
        );
    }

    #[test]
    fn backlog_larger_than_queue_is_not_lost() {
        let buf = SharedBuf::default();
        let sink = LogSink::with_writer(buf.clone()).unwrap();
        for i in 0..(SINK_CAPACITY * 4) {
            sink.submit(Reading::new(ts(), "s", i as f64).into());
        }
        assert_eq!(sink.close(), (SINK_CAPACITY * 4) as u64);
        assert_eq!(buf.text().lines().count(), SINK_CAPACITY * 4);
    }

    #[test]
    fn submit_after_close_is_dropped() {
        let buf = SharedBuf::default();
        let sink = LogSink::with_writer(buf.clone()).unwrap();
        sink.close();
        sink.submit(Reading::new(ts(), "late", 1.0).into());
        assert_eq!(
            sink.try_submit(Reading::new(ts(), "later", 2.0).into()),
            Err(SinkError::Closed)
        );
        assert!(sink.is_closed());
        assert_eq!(sink.close(), 0);
        assert!(buf.text().is_empty());
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mound.log");
        std::fs::write(&path, "old line\n").unwrap();

        let sink = LogSink::open(&path).unwrap();
        sink.submit(Reading::new(ts(), "s1", 3.5).into());
        drop(sink);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "old line\n2019.01.01_00:00:05 s1 3.5\n");
    }
}
