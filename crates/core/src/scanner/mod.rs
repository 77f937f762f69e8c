//! Scanner invocation.
//!
//! The engine only sees the [`Scanner`] trait: a single operation that scans a
//! path and hands back the raw text report. [`CommandScanner`] implements it by
//! shelling out to a console antivirus; tests substitute deterministic fakes.

mod command;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub use command::{CommandScanner, DEFAULT_SCAN_ARGS, TARGET_PLACEHOLDER};

/// Raw standard output of one scanner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReport {
    raw_text: String,
}

impl ScanReport {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self { raw_text: raw_text.into() }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to spawn scanner {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait on scanner process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("Scanner did not finish within {0:?}; process killed")]
    TimedOut(Duration),
}

/// Anything that can produce a report for a file on disk.
pub trait Scanner: Send + Sync {
    fn scan(&self, target: &Path) -> Result<ScanReport, ScanError>;
    fn name(&self) -> &str;
}

/// Return the first candidate that exists as a regular file.
pub fn discover_scanner<I, P>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    candidates.into_iter().map(|p| p.as_ref().to_path_buf()).find(|p| p.is_file())
}
