//! Data source backed by a JSON status document next to the raw file.
//!
//! An instrument bridge rewrites `<file>.status.json` while the run is being
//! acquired. Each [`refresh`](RawDataSource::refresh) re-reads the whole
//! document; reads in between answer from the last parsed copy.
//!
//! ```json
//! {
//!   "file_name": "run01.raw",
//!   "in_acquisition": true,
//!   "run_header": {
//!     "first_spectrum": 1,
//!     "last_spectrum": 2,
//!     "spectra_count": 2,
//!     "expected_runtime_seconds": 3600.0,
//!     "description": "QC run"
//!   },
//!   "scans": [
//!     { "index": 1, "retention_time_minutes": 0.01, "ms_order": "ms", "base_intensity": 1.2e6 },
//!     { "index": 2, "retention_time_minutes": 0.02, "ms_order": 2, "base_intensity": 3.4e5 }
//!   ]
//! }
//! ```

use crate::error::{OpenError, ReadError};
use crate::source::{MsOrder, RawDataSource, SourceOpener};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const STATUS_SUFFIX: &str = ".status.json";

/// Path of the status document for a raw file.
pub fn status_path_for(raw_path: &Path) -> PathBuf {
    let mut name: OsString = raw_path.as_os_str().to_owned();
    name.push(STATUS_SUFFIX);
    PathBuf::from(name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    #[serde(default)]
    pub file_name: String,
    pub in_acquisition: bool,
    pub run_header: RunHeader,
    #[serde(default)]
    pub scans: Vec<ScanEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub first_spectrum: i64,
    pub last_spectrum: i64,
    pub spectra_count: i64,
    pub expected_runtime_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub index: i64,
    pub retention_time_minutes: f64,
    pub ms_order: OrderField,
    #[serde(default)]
    pub base_intensity: f64,
}

/// MS order as written by the bridge: a name (`"ms2"`) or the numeric level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderField {
    Level(i32),
    Named(MsOrder),
}

impl OrderField {
    fn resolve(self) -> MsOrder {
        match self {
            OrderField::Level(level) => MsOrder::from_level(level),
            OrderField::Named(order) => order,
        }
    }
}

pub struct StatusFileSource {
    raw_path: PathBuf,
    status_path: PathBuf,
    document: StatusDocument,
}

impl StatusFileSource {
    pub fn open(raw_path: &Path) -> Result<Self, OpenError> {
        let status_path = status_path_for(raw_path);
        let document =
            read_document(&status_path).map_err(|message| OpenError::new(raw_path, message))?;
        debug!(path = %status_path.display(), scans = document.scans.len(), "Opened status document");
        Ok(Self {
            raw_path: raw_path.to_path_buf(),
            status_path,
            document,
        })
    }

    pub fn document(&self) -> &StatusDocument {
        &self.document
    }

    fn scan(&self, operation: &'static str, index: i64) -> Result<&ScanEntry, ReadError> {
        self.document
            .scans
            .iter()
            .rev()
            .find(|scan| scan.index == index)
            .ok_or_else(|| ReadError::new(operation, format!("scan {} not present", index)))
    }
}

fn read_document(path: &Path) -> Result<StatusDocument, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("invalid status document {}: {}", path.display(), e))
}

impl RawDataSource for StatusFileSource {
    fn refresh(&mut self) -> Result<(), ReadError> {
        self.document =
            read_document(&self.status_path).map_err(|message| ReadError::new("refresh", message))?;
        Ok(())
    }

    fn is_in_acquisition(&self) -> Result<bool, ReadError> {
        Ok(self.document.in_acquisition)
    }

    fn spectrum_count(&self) -> Result<i64, ReadError> {
        Ok(self.document.run_header.spectra_count)
    }

    fn first_spectrum_index(&self) -> Result<i64, ReadError> {
        Ok(self.document.run_header.first_spectrum)
    }

    fn last_spectrum_index(&self) -> Result<i64, ReadError> {
        Ok(self.document.run_header.last_spectrum)
    }

    fn retention_time_minutes(&self, scan: i64) -> Result<f64, ReadError> {
        Ok(self.scan("retention time", scan)?.retention_time_minutes)
    }

    fn expected_runtime_seconds(&self) -> Result<f64, ReadError> {
        Ok(self.document.run_header.expected_runtime_seconds)
    }

    fn ms_order(&self, scan: i64) -> Result<MsOrder, ReadError> {
        Ok(self.scan("ms order", scan)?.ms_order.resolve())
    }

    fn max_intensity(&self, scan: i64) -> Result<f64, ReadError> {
        Ok(self.scan("base intensity", scan)?.base_intensity)
    }

    fn file_name(&self) -> String {
        if !self.document.file_name.is_empty() {
            return self.document.file_name.clone();
        }
        self.raw_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.raw_path.display().to_string())
    }

    fn run_header_summary(&self) -> Option<String> {
        self.document.run_header.description.clone()
    }
}

/// Opens [`StatusFileSource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusFileOpener;

impl SourceOpener for StatusFileOpener {
    type Source = StatusFileSource;

    fn open(&self, path: &Path) -> Result<StatusFileSource, OpenError> {
        StatusFileSource::open(path)
    }
}
