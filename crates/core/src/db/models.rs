use serde::{Deserialize, Serialize};

use crate::engine::Outcome;

/// How a recorded run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotMalicious,
    Localized,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotMalicious => "not_malicious",
            RunStatus::Localized => "localized",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_malicious" => Ok(RunStatus::NotMalicious),
            "localized" => Ok(RunStatus::Localized),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// One bisection run as stored in the history database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub file_path: String,
    pub file_sha256: Option<String>,
    pub file_len: u64,
    pub scanner: String,
    pub status: RunStatus,
    pub localized_offset: Option<u64>,
    pub upper_bound: Option<u64>,
    pub signatures: Vec<String>,
    pub iterations: u64,
    pub scans: u64,
    /// Free-form failure reason for `Failed` runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl RunRecord {
    /// Build a record for a run that produced an outcome.
    pub fn from_outcome(
        file_path: impl Into<String>,
        file_sha256: Option<String>,
        file_len: u64,
        scanner: impl Into<String>,
        outcome: &Outcome,
        started_at: impl Into<String>,
        finished_at: impl Into<String>,
    ) -> Self {
        let stats = outcome.stats();
        let (status, localized_offset, upper_bound, signatures) = match outcome {
            Outcome::NotMalicious { .. } => (RunStatus::NotMalicious, None, None, Vec::new()),
            Outcome::Localized(result) => (
                RunStatus::Localized,
                Some(result.localized_offset as u64),
                Some(result.upper_bound as u64),
                result.signatures.iter().cloned().collect(),
            ),
        };
        Self {
            file_path: file_path.into(),
            file_sha256,
            file_len,
            scanner: scanner.into(),
            status,
            localized_offset,
            upper_bound,
            signatures,
            iterations: stats.iterations as u64,
            scans: stats.scans as u64,
            error: None,
            started_at: started_at.into(),
            finished_at: finished_at.into(),
        }
    }

    /// Build a record for a run that aborted with an error.
    pub fn failed(
        file_path: impl Into<String>,
        file_sha256: Option<String>,
        file_len: u64,
        scanner: impl Into<String>,
        error: impl Into<String>,
        started_at: impl Into<String>,
        finished_at: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_sha256,
            file_len,
            scanner: scanner.into(),
            status: RunStatus::Failed,
            localized_offset: None,
            upper_bound: None,
            signatures: Vec::new(),
            iterations: 0,
            scans: 0,
            error: Some(error.into()),
            started_at: started_at.into(),
            finished_at: finished_at.into(),
        }
    }

    /// Record how far a failed run got.
    pub fn with_counts(mut self, iterations: u64, scans: u64) -> Self {
        self.iterations = iterations;
        self.scans = scans;
        self
    }
}
