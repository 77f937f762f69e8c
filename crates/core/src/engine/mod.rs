//! Prefix bisection engine.
//!
//! Given a file whose full scan is flagged, the engine repeatedly writes a
//! prefix of it to a scratch file, scans that, and halves the window between
//! the longest clean prefix and the shortest flagged one. Progress and
//! signature names flow to two helper threads over channels; the search loop
//! itself is synchronous.

mod window;

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{BisectConfig, InconclusivePolicy};
use crate::progress::{latest_channel, LatestSender, ProgressEvent, ProgressReporter, ProgressSink};
use crate::scanner::Scanner;
use crate::threats::{dedup, ThreatCollector, ThreatSet};
use crate::verdict::{ReportMarkers, Verdict};

pub use window::SearchWindow;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read {path}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create scratch directory under {path}: {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write scratch file {path}: {source}")]
    WriteScratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Scanner verdict inconclusive after {attempts} attempt(s): {reason}")]
    Inconclusive { attempts: usize, reason: String, iterations: usize, scans: usize },
    #[error(
        "Search budget of {budget:?} exhausted after {iterations} iteration(s); window was {last_good}..{upper_bound}"
    )]
    BudgetExhausted {
        budget: Duration,
        iterations: usize,
        scans: usize,
        last_good: usize,
        upper_bound: usize,
    },
    #[error("Failed to start {0} thread: {1}")]
    SpawnTask(&'static str, #[source] std::io::Error),
    #[error("{0} thread panicked")]
    TaskPanicked(&'static str),
}

impl EngineError {
    /// Completed iterations and scanner invocations at the point of failure.
    /// Errors raised before any scanning report zero.
    pub fn counts(&self) -> (usize, usize) {
        match self {
            EngineError::Inconclusive { iterations, scans, .. }
            | EngineError::BudgetExhausted { iterations, scans, .. } => (*iterations, *scans),
            _ => (0, 0),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Knobs for one search. Usually built from a [`BisectConfig`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub markers: ReportMarkers,
    pub progress_interval: Duration,
    pub budget: Option<Duration>,
    pub inconclusive: InconclusivePolicy,
    pub max_retries: u32,
    pub scratch_dir: Option<PathBuf>,
    pub scratch_file_name: String,
    pub dump_context: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&BisectConfig::default())
    }
}

impl From<&BisectConfig> for EngineOptions {
    fn from(config: &BisectConfig) -> Self {
        let engine = &config.engine;
        Self {
            markers: config.markers.clone(),
            progress_interval: engine.progress_interval(),
            budget: engine.budget(),
            inconclusive: engine.inconclusive,
            max_retries: engine.max_retries,
            scratch_dir: engine.scratch_dir.as_ref().map(PathBuf::from),
            scratch_file_name: engine.scratch_file_name.clone(),
            dump_context: engine.dump_context,
        }
    }
}

/// Counters describing how much work a search did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchStats {
    /// Bisection steps (prefix scans with a usable verdict).
    pub iterations: usize,
    /// Scanner invocations, including the full-file scan and retries.
    pub scans: usize,
    /// Reports the progress reporter emitted.
    pub progress_reports: usize,
    pub elapsed: Duration,
}

/// Where the verdict flips from clean to flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisectionResult {
    /// Longest prefix length the scanner considers clean.
    pub localized_offset: usize,
    /// Shortest prefix length the scanner flags; always `localized_offset + 1`.
    pub upper_bound: usize,
    pub file_len: usize,
    pub signatures: ThreatSet,
    /// Byte range around the boundary worth showing to a human.
    pub window: Range<usize>,
    pub stats: SearchStats,
}

impl BisectionResult {
    pub fn window_bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let end = self.window.end.min(data.len());
        let start = self.window.start.min(end);
        &data[start..end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    NotMalicious { stats: SearchStats },
    Localized(BisectionResult),
}

impl Outcome {
    pub fn stats(&self) -> &SearchStats {
        match self {
            Outcome::NotMalicious { stats } => stats,
            Outcome::Localized(result) => &result.stats,
        }
    }
}

/// Drives the search against an injected scanner.
pub struct Bisector<'a> {
    pub scanner: &'a dyn Scanner,
    pub options: EngineOptions,
}

impl<'a> Bisector<'a> {
    pub fn new(scanner: &'a dyn Scanner, options: EngineOptions) -> Self {
        Self { scanner, options }
    }

    /// Read `path`, scan it whole, and bisect if the scanner flags it.
    pub fn run_file(&self, path: &Path, sink: Box<dyn ProgressSink>) -> EngineResult<Outcome> {
        let data = fs::read(path)
            .map_err(|source| EngineError::ReadSource { path: path.to_path_buf(), source })?;
        self.run(path, &data, sink)
    }

    /// Like [`Bisector::run_file`] for callers that already hold the file contents.
    /// `path` must point at the same bytes; it is what the full-file scan sees.
    pub fn run(
        &self,
        path: &Path,
        data: &[u8],
        sink: Box<dyn ProgressSink>,
    ) -> EngineResult<Outcome> {
        let started = Instant::now();
        let (initial, attempts) = self.checked_scan(path)?;
        let stats = SearchStats { scans: attempts, ..SearchStats::default() };
        self.bisect_from(data, &initial, started, stats, sink)
    }

    /// Bisect `data` given the verdict of an earlier full-file scan.
    pub fn bisect(
        &self,
        data: &[u8],
        full_scan: &Verdict,
        sink: Box<dyn ProgressSink>,
    ) -> EngineResult<Outcome> {
        let initial = match full_scan {
            Verdict::Inconclusive(reason) => match self.options.inconclusive {
                InconclusivePolicy::TreatAsClean => Verdict::Clean,
                _ => {
                    return Err(EngineError::Inconclusive {
                        attempts: 1,
                        reason: reason.clone(),
                        iterations: 0,
                        scans: 0,
                    })
                }
            },
            other => other.clone(),
        };
        self.bisect_from(data, &initial, Instant::now(), SearchStats::default(), sink)
    }

    fn bisect_from(
        &self,
        data: &[u8],
        initial: &Verdict,
        started: Instant,
        mut stats: SearchStats,
        sink: Box<dyn ProgressSink>,
    ) -> EngineResult<Outcome> {
        if !initial.is_malicious() {
            info!("No threat detected in the original file");
            stats.elapsed = started.elapsed();
            return Ok(Outcome::NotMalicious { stats });
        }
        info!(
            scanner = self.scanner.name(),
            len = data.len(),
            "Threat detected in the original file, beginning binary search"
        );

        let (progress_tx, progress_rx) = latest_channel();
        let reporter = ProgressReporter::spawn(progress_rx, self.options.progress_interval, sink)
            .map_err(|e| EngineError::SpawnTask("progress reporter", e))?;
        let (threat_tx, threat_rx) = unbounded();
        let collector = match ThreatCollector::spawn(threat_rx) {
            Ok(collector) => collector,
            Err(e) => {
                drop(progress_tx);
                let _ = reporter.join();
                return Err(EngineError::SpawnTask("threat collector", e));
            }
        };

        if let Some(signature) = initial.signature() {
            let _ = threat_tx.send(signature.to_string());
        }

        let searched = self.search(data, started, &progress_tx, &threat_tx, &mut stats);

        // Closing both channels is what lets the helper threads exit.
        drop(progress_tx);
        drop(threat_tx);
        let reported = reporter.join().map_err(|_| EngineError::TaskPanicked("progress reporter"))?;
        let names = collector.join().map_err(|_| EngineError::TaskPanicked("threat collector"))?;

        let (window, found) = searched?;
        stats.progress_reports = reported;
        stats.elapsed = started.elapsed();

        if !found {
            info!(iterations = stats.iterations, "Not malicious");
            return Ok(Outcome::NotMalicious { stats });
        }

        let last_good = window.last_good();
        let upper_bound = window.upper_bound();
        let context = self.options.dump_context;
        let result = BisectionResult {
            localized_offset: last_good,
            upper_bound,
            file_len: data.len(),
            signatures: dedup(names),
            window: last_good.saturating_sub(context)
                ..upper_bound.saturating_add(context).min(data.len()),
            stats,
        };
        info!(
            offset = %format!("0x{:X}", last_good),
            iterations = stats.iterations,
            scans = stats.scans,
            "Isolated bad bytes"
        );
        Ok(Outcome::Localized(result))
    }

    fn search(
        &self,
        data: &[u8],
        started: Instant,
        progress: &LatestSender<ProgressEvent>,
        threats: &Sender<String>,
        stats: &mut SearchStats,
    ) -> EngineResult<(SearchWindow, bool)> {
        let mut window = SearchWindow::new(data.len());
        let mut found = false;
        if !window.is_open() {
            return Ok((window, found));
        }

        let scratch = self.scratch_dir()?;
        let scratch_path = scratch.path().join(&self.options.scratch_file_name);

        while window.is_open() {
            if let Some(budget) = self.options.budget {
                if started.elapsed() >= budget {
                    return Err(EngineError::BudgetExhausted {
                        budget,
                        iterations: stats.iterations,
                        scans: stats.scans,
                        last_good: window.last_good(),
                        upper_bound: window.upper_bound(),
                    });
                }
            }

            let candidate = window.candidate();
            fs::write(&scratch_path, &data[candidate.clone()]).map_err(|source| {
                EngineError::WriteScratch { path: scratch_path.clone(), source }
            })?;
            debug!("Scanning from {} to {} bytes", candidate.start, candidate.end);

            let (verdict, attempts) = match self.checked_scan(&scratch_path) {
                Ok(settled) => settled,
                Err(EngineError::Inconclusive { attempts, reason, .. }) => {
                    return Err(EngineError::Inconclusive {
                        attempts,
                        reason,
                        iterations: stats.iterations,
                        scans: stats.scans + attempts,
                    })
                }
                Err(e) => return Err(e),
            };
            stats.scans += attempts;
            stats.iterations += 1;

            let malicious = verdict.is_malicious();
            progress.publish(ProgressEvent {
                low: candidate.start,
                high: candidate.end,
                malicious,
                elapsed: started.elapsed(),
            });

            if malicious {
                debug!(
                    "Threat detected in the range {} to {} bytes",
                    candidate.start, candidate.end
                );
                found = true;
                if let Some(signature) = verdict.signature() {
                    let _ = threats.send(signature.to_string());
                }
            } else {
                debug!(
                    "No threat detected in the range {} to {} bytes",
                    candidate.start, candidate.end
                );
            }
            window.narrow(malicious);
        }

        Ok((window, found))
    }

    /// Scan `path` and resolve inconclusive verdicts per policy. The returned
    /// verdict is never `Inconclusive`; the count includes retries.
    fn checked_scan(&self, path: &Path) -> EngineResult<(Verdict, usize)> {
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let verdict = match self.scanner.scan(path) {
                Ok(report) => self.options.markers.classify(&report),
                Err(e) => Verdict::Inconclusive(e.to_string()),
            };
            let reason = match verdict {
                Verdict::Inconclusive(reason) => reason,
                settled => return Ok((settled, attempts)),
            };
            match self.options.inconclusive {
                InconclusivePolicy::TreatAsClean => {
                    warn!(%reason, path = %path.display(), "inconclusive scan counted as clean");
                    return Ok((Verdict::Clean, attempts));
                }
                InconclusivePolicy::Retry if attempts <= self.options.max_retries as usize => {
                    warn!(%reason, attempt = attempts, "inconclusive scan; retrying");
                }
                _ => {
                    return Err(EngineError::Inconclusive {
                        attempts,
                        reason,
                        iterations: 0,
                        scans: attempts,
                    })
                }
            }
        }
    }

    fn scratch_dir(&self) -> EngineResult<TempDir> {
        let parent = self.options.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&parent)
            .and_then(|_| tempfile::Builder::new().prefix("sigbisect-").tempdir_in(&parent))
            .map_err(|source| EngineError::ScratchDir { path: parent, source })
    }
}
