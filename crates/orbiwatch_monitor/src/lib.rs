//! Orbiwatch Monitor - live acquisition tracking for instrument data files
//!
//! Watches a single raw file from the moment it appears until the instrument
//! reports that acquisition has finished:
//!
//! 1. **Bootstrap**: open the file, record its initial spectrum count and last index
//! 2. **Awaiting first spectrum**: poll until both values have moved
//! 3. **Baseline**: compute dead time from the first spectrum's retention time
//! 4. **Monitoring**: report progress while the file is still being acquired
//! 5. **Completed**: one final record, then stop
//!
//! The vendor reader, the directory watcher and the report destinations are
//! reached through traits ([`RawDataSource`], [`SourceOpener`], [`ReportSink`]).
//! A [`Dispatcher`] connects a stream of new paths to a pool of sessions.

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod monitor;
pub mod report;
pub mod session;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod status_file;

pub use cancel::{sleep_or_cancelled, CancellationToken};
pub use config::{DispatchConfig, MonitorConfig, RetryPolicy};
pub use dispatch::{arrival_channel, DispatchSummary, Dispatcher};
pub use error::{MonitorError, OpenError, ReadError, Result};
pub use monitor::{AcquisitionMonitor, SessionOutcome, SessionSummary};
pub use report::{ReportEvent, ReportFormat, ReportRecord};
pub use session::{AcquisitionSession, Phase};
pub use sink::{AppendLogWriter, ConsoleWriter, FanoutSink, MemorySink, ReportSink, ReportWriter};
pub use snapshot::{ScanMetrics, Snapshot};
pub use source::{MsOrder, RawDataSource, SourceOpener};
pub use status_file::{StatusFileOpener, StatusFileSource};
