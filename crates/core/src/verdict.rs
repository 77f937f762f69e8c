//! Interpretation of the scanner's human-readable report.
//!
//! The scanner exposes no structured API, so classification is a plain
//! substring match against its output. The markers default to what the
//! console scanner prints and can be overridden through configuration.

use serde::{Deserialize, Serialize};

use crate::scanner::ScanReport;

/// Substring flagging a detection anywhere in a report line.
pub const DEFAULT_SUSPICION_MARKER: &str = "suspicion";
/// Prefix carried by heuristic signature names (e.g. `HEUR:Trojan.Win32.Generic`).
pub const DEFAULT_SIGNATURE_PREFIX: &str = "HEUR:";

/// Marker substrings used to read a scanner report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportMarkers {
    pub suspicion: String,
    pub signature_prefix: String,
}

impl Default for ReportMarkers {
    fn default() -> Self {
        Self {
            suspicion: DEFAULT_SUSPICION_MARKER.to_string(),
            signature_prefix: DEFAULT_SIGNATURE_PREFIX.to_string(),
        }
    }
}

/// Classification of one scanner report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Malicious { signature: Option<String> },
    Clean,
    /// The report could not be trusted either way (no output, timeout, spawn failure).
    Inconclusive(String),
}

impl Verdict {
    pub fn is_malicious(&self) -> bool {
        matches!(self, Verdict::Malicious { .. })
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            Verdict::Malicious { signature } => signature.as_deref(),
            _ => None,
        }
    }
}

impl ReportMarkers {
    /// True iff any line of the report contains the suspicion marker.
    pub fn is_malicious(&self, raw: &str) -> bool {
        raw.lines().any(|line| line.contains(self.suspicion.as_str()))
    }

    /// First whitespace-delimited token containing the signature prefix, taken
    /// from the first line that mentions it.
    pub fn extract_signature(&self, raw: &str) -> Option<String> {
        let prefix = self.signature_prefix.as_str();
        raw.lines()
            .find(|line| line.contains(prefix))
            .and_then(|line| line.split_whitespace().find(|part| part.contains(prefix)))
            .map(|token| token.to_string())
    }

    /// Three-way classification of a report.
    pub fn classify(&self, report: &ScanReport) -> Verdict {
        let raw = report.raw_text();
        if raw.trim().is_empty() {
            return Verdict::Inconclusive("scanner produced no output".to_string());
        }
        if self.is_malicious(raw) {
            Verdict::Malicious { signature: self.extract_signature(raw) }
        } else {
            Verdict::Clean
        }
    }
}
