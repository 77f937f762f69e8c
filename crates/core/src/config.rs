//! Serializable configuration for scanner discovery, invocation, and the engine.
//!
//! Every field has a default, so a config file only needs the keys it changes.
//! Files ending in `.yaml`/`.yml` are read as YAML, anything else as JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use crate::scanner::{CommandScanner, DEFAULT_SCAN_ARGS};
use crate::verdict::ReportMarkers;

pub const DEFAULT_PRIMARY_PATH: &str =
    r"C:\Program Files (x86)\Kaspersky Lab\Kaspersky Security Cloud 21.3\avp.com";
pub const DEFAULT_ALTERNATE_PATH: &str =
    r"C:\Program Files\Kaspersky Lab\Kaspersky Security Cloud 21.3\avp.com";
pub const DEFAULT_HISTORY_DB: &str = ".sigbisect/history.db";

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BisectConfig {
    pub scanner: ScannerConfig,
    pub markers: ReportMarkers,
    pub engine: EngineConfig,
    /// Run history database; relative paths resolve against the working directory.
    pub history_db: Option<String>,
}

/// Where the scanner lives and how to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub primary_path: String,
    pub alternate_path: String,
    /// Probed after the primary and alternate paths.
    pub extra_candidates: Vec<String>,
    /// Argument template; `{target}` is replaced with the file to scan.
    pub args: Vec<String>,
    /// Per-invocation timeout. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            primary_path: DEFAULT_PRIMARY_PATH.to_string(),
            alternate_path: DEFAULT_ALTERNATE_PATH.to_string(),
            extra_candidates: Vec::new(),
            args: DEFAULT_SCAN_ARGS.iter().map(|a| a.to_string()).collect(),
            timeout_secs: Some(120),
        }
    }
}

impl ScannerConfig {
    /// Candidate install paths in probe order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        [&self.primary_path, &self.alternate_path]
            .into_iter()
            .chain(self.extra_candidates.iter())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Build a process-backed scanner for `executable` using this config's arguments.
    pub fn command_scanner(&self, executable: impl Into<PathBuf>) -> CommandScanner {
        CommandScanner::new(executable).with_args(self.args.clone()).with_timeout(self.timeout())
    }
}

/// What to do when a scan yields no usable verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconclusivePolicy {
    /// Count the scan as clean and keep going.
    TreatAsClean,
    /// Re-scan up to `max_retries` more times, then abort.
    #[default]
    Retry,
    /// Abort the search.
    Abort,
}

impl std::str::FromStr for InconclusivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "treat_as_clean" | "treat-as-clean" | "clean" => Ok(Self::TreatAsClean),
            "retry" => Ok(Self::Retry),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unknown inconclusive policy '{other}' (expected treat_as_clean, retry, or abort)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub progress_interval_ms: u64,
    /// Wall-clock budget for the whole search. `None` means unlimited.
    pub budget_secs: Option<u64>,
    pub inconclusive: InconclusivePolicy,
    pub max_retries: u32,
    /// Parent for the scratch directory; defaults to the system temp dir.
    pub scratch_dir: Option<String>,
    pub scratch_file_name: String,
    /// Bytes of context on each side of the localized window.
    pub dump_context: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
            budget_secs: None,
            inconclusive: InconclusivePolicy::default(),
            max_retries: 2,
            scratch_dir: None,
            scratch_file_name: "candidate.exe".to_string(),
            dump_context: 32,
        }
    }
}

impl EngineConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget_secs.map(Duration::from_secs)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
}

/// Load a config file, picking the format from its extension.
pub fn load_config(path: &Path) -> Result<BisectConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let config = if is_yaml(path) {
        serde_yaml::from_str(&body).context("Failed to parse config YAML")?
    } else {
        serde_json::from_str(&body).context("Failed to parse config JSON")?
    };
    Ok(config)
}

/// Serialize a config in the format implied by `path`.
pub fn render_config(config: &BisectConfig, path: &Path) -> Result<String> {
    if is_yaml(path) {
        serde_yaml::to_string(config).context("Failed to serialize config to YAML")
    } else {
        serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")
    }
}
