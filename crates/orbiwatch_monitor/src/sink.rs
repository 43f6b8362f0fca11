//! Report sinks.
//!
//! A [`ReportSink`] receives whole records. [`FanoutSink`] renders each record
//! once and hands the lines to every [`ReportWriter`] while holding a single
//! lock, so records from concurrent sessions never interleave. Writers fail
//! independently: an error on one is logged and counted, the rest still get
//! the record.

use crate::report::{ReportFormat, ReportRecord};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Destination for report records. Shared between sessions.
pub trait ReportSink: Send + Sync {
    fn emit(&self, record: &ReportRecord);
}

/// A single destination for rendered report lines.
pub trait ReportWriter: Send {
    fn name(&self) -> &str;

    /// Append `lines` in order. Called with all lines of one record.
    fn write_lines(&mut self, lines: &[String]) -> io::Result<()>;
}

/// Writes lines to stdout.
pub struct ConsoleWriter;

impl ReportWriter for ConsoleWriter {
    fn name(&self) -> &str {
        "console"
    }

    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for line in lines {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    }
}

/// Append-only log file, flushed after every record.
pub struct AppendLogWriter {
    path: PathBuf,
    file: File,
}

impl AppendLogWriter {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportWriter for AppendLogWriter {
    fn name(&self) -> &str {
        "report-log"
    }

    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        let mut buf = String::new();
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }
        self.file.write_all(buf.as_bytes())?;
        self.file.flush()
    }
}

struct WriterSlot {
    writer: Box<dyn ReportWriter>,
    failures: u64,
}

/// Fans every record out to N writers.
///
/// Writes are blocking and run on the emitting task's thread with the lock
/// held, so a stalled writer (a full stdout pipe) also holds up the others
/// and that runtime thread. Acceptable while sessions emit a few records
/// per poll interval; a busier producer needs a dedicated writer task.
pub struct FanoutSink {
    format: ReportFormat,
    writers: Mutex<Vec<WriterSlot>>,
}

impl FanoutSink {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            writers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_writer(self, writer: impl ReportWriter + 'static) -> Self {
        self.add_writer(Box::new(writer));
        self
    }

    pub fn add_writer(&self, writer: Box<dyn ReportWriter>) {
        let mut writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        writers.push(WriterSlot {
            writer,
            failures: 0,
        });
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Failed writes per writer, in registration order.
    pub fn failure_counts(&self) -> Vec<(String, u64)> {
        let writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        writers
            .iter()
            .map(|slot| (slot.writer.name().to_string(), slot.failures))
            .collect()
    }
}

impl ReportSink for FanoutSink {
    fn emit(&self, record: &ReportRecord) {
        let lines = record.render(self.format);
        // A panic in one writer must not silence the others for the rest of the run.
        let mut writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        for slot in writers.iter_mut() {
            if let Err(err) = slot.writer.write_lines(&lines) {
                slot.failures += 1;
                warn!(
                    writer = slot.writer.name(),
                    failures = slot.failures,
                    error = %err,
                    "Report writer failed; record delivered to remaining writers"
                );
            }
        }
    }
}

/// Collects records in memory. Useful for embedding and tests.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ReportRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReportRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, record: &ReportRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }
}

impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    fn emit(&self, record: &ReportRecord) {
        (**self).emit(record)
    }
}
