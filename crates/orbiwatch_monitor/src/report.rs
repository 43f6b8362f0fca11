//! Report records emitted by a monitoring session
//!
//! One record per poll tick plus boundary records. Records are immutable and
//! rendered either as human-readable text lines or as one JSON object.

use crate::session::Phase;
use crate::snapshot::Snapshot;
use crate::source::MsOrder;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How records are turned into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub at: DateTime<Local>,
    #[serde(flatten)]
    pub event: ReportEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEvent {
    /// A new file was opened; carries the initial snapshot values.
    FileObserved {
        path: PathBuf,
        created_at: DateTime<Local>,
        in_acquisition: bool,
        spectrum_count: i64,
        last_spectrum_index: i64,
        run_header: Option<String>,
    },
    /// Still waiting for the first complete spectrum.
    AwaitingFirstSpectrum { elapsed_secs: f64 },
    /// Both counters moved; baseline computed.
    FirstSpectrumRecorded {
        first_spectrum_index: i64,
        first_retention_secs: f64,
        dead_time_secs: f64,
    },
    /// One monitoring poll.
    Progress {
        elapsed_secs: f64,
        retention_time_secs: Option<f64>,
        estimated_remaining_secs: Option<f64>,
        last_spectrum_index: i64,
        spectrum_count: i64,
        base_intensity: Option<f64>,
        ms_order: Option<MsOrder>,
    },
    /// The data source stopped reporting acquisition.
    AcquisitionComplete { file_name: String },
    /// The session was stopped by shutdown before completing.
    SessionCancelled { path: PathBuf, phase: Phase },
    /// A read failed beyond the retry budget; the session is over.
    ReadFailed { path: PathBuf, phase: Phase, message: String },
}

impl ReportRecord {
    pub fn now(event: ReportEvent) -> Self {
        Self {
            at: Local::now(),
            event,
        }
    }

    pub fn progress(elapsed: Duration, snapshot: &Snapshot) -> Self {
        let scan = snapshot.last_scan;
        Self::now(ReportEvent::Progress {
            elapsed_secs: elapsed.as_secs_f64(),
            retention_time_secs: scan.map(|s| s.retention_time.as_secs_f64()),
            estimated_remaining_secs: snapshot.estimated_remaining().map(|d| d.as_secs_f64()),
            last_spectrum_index: snapshot.last_spectrum_index,
            spectrum_count: snapshot.spectrum_count,
            base_intensity: scan.map(|s| s.base_intensity),
            ms_order: scan.map(|s| s.ms_order),
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event,
            ReportEvent::AcquisitionComplete { .. }
                | ReportEvent::SessionCancelled { .. }
                | ReportEvent::ReadFailed { .. }
        )
    }

    /// Render as lines in the requested format. JSON always yields one line.
    pub fn render(&self, format: ReportFormat) -> Vec<String> {
        match format {
            ReportFormat::Text => self.text_lines(),
            ReportFormat::Json => vec![serde_json::to_string(self)
                .unwrap_or_else(|e| format!("{{\"kind\":\"render_error\",\"message\":\"{}\"}}", e))],
        }
    }

    fn text_lines(&self) -> Vec<String> {
        let stamp = format!("[{}]", self.at.format(TIMESTAMP_FORMAT));
        let body: Vec<String> = match &self.event {
            ReportEvent::FileObserved {
                path,
                created_at,
                in_acquisition,
                spectrum_count,
                last_spectrum_index,
                run_header,
            } => {
                let mut lines = vec![
                    format!("{} created at {}", path.display(), created_at.format(TIMESTAMP_FORMAT)),
                    format!("InAcquisition: {}", in_acquisition),
                ];
                if let Some(header) = run_header {
                    lines.push(format!("Run header: {}", header));
                }
                lines.push(format!("Spectra count: {}", spectrum_count));
                lines.push(format!("Last spectrum: {}", last_spectrum_index));
                lines
            }
            ReportEvent::AwaitingFirstSpectrum { elapsed_secs } => vec![format!(
                "Waiting for a spectrum to be recorded. {:.1} seconds elapsed.",
                elapsed_secs
            )],
            ReportEvent::FirstSpectrumRecorded {
                first_spectrum_index,
                first_retention_secs,
                dead_time_secs,
            } => vec![
                format!(
                    "A spectrum has been recorded (scan {}, retention time {:.2} s).",
                    first_spectrum_index, first_retention_secs
                ),
                format!("Dead time: {:.2} s", dead_time_secs),
                "Now watching the file as new spectra are recorded.".to_string(),
            ],
            ReportEvent::Progress {
                elapsed_secs,
                retention_time_secs,
                estimated_remaining_secs,
                last_spectrum_index,
                spectrum_count,
                base_intensity,
                ms_order,
            } => {
                return self.progress_lines(
                    &stamp,
                    *elapsed_secs,
                    *retention_time_secs,
                    *estimated_remaining_secs,
                    *last_spectrum_index,
                    *spectrum_count,
                    *base_intensity,
                    *ms_order,
                );
            }
            ReportEvent::AcquisitionComplete { file_name } => {
                vec![format!("{} reports it is done being acquired!", file_name)]
            }
            ReportEvent::SessionCancelled { path, phase } => vec![format!(
                "Stopped watching {} during {:?}.",
                path.display(),
                phase
            )],
            ReportEvent::ReadFailed {
                path,
                phase,
                message,
            } => vec![format!(
                "Lost access to {} during {:?}: {}",
                path.display(),
                phase,
                message
            )],
        };

        body.into_iter()
            .map(|line| format!("{} {}", stamp, line))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn progress_lines(
        &self,
        stamp: &str,
        elapsed_secs: f64,
        retention_time_secs: Option<f64>,
        estimated_remaining_secs: Option<f64>,
        last_spectrum_index: i64,
        spectrum_count: i64,
        base_intensity: Option<f64>,
        ms_order: Option<MsOrder>,
    ) -> Vec<String> {
        let mut lines = vec![
            format!("{} Seconds since file creation: {:.1}", stamp, elapsed_secs),
            format!(
                "{} Current retention time: {}",
                stamp,
                minutes_or_na(retention_time_secs)
            ),
            format!(
                "{} Estimated time until end of run: {}",
                stamp,
                minutes_or_na(estimated_remaining_secs)
            ),
            format!(
                "{} Latest spectrum: {}\tTotal spectra: {}",
                stamp, last_spectrum_index, spectrum_count
            ),
            format!(
                "{} Base intensity of latest scan: {}",
                stamp,
                base_intensity
                    .map(|v| format!("{:.4e}", v))
                    .unwrap_or_else(|| "n/a".to_string())
            ),
            format!(
                "{} MS order of latest scan: {}",
                stamp,
                ms_order
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            ),
        ];
        lines.push(String::new());
        lines
    }
}

fn minutes_or_na(secs: Option<f64>) -> String {
    secs.map(|s| format!("{:.2} min", s / 60.0))
        .unwrap_or_else(|| "n/a".to_string())
}
