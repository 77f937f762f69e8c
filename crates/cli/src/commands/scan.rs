use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use bisect_core::config::{BisectConfig, InconclusivePolicy};
use bisect_core::db::RunRecord;
use bisect_core::engine::{Bisector, EngineOptions, Outcome};
use bisect_core::progress::{ProgressEvent, ProgressSink, TracingSink};

use crate::commands::{history_db_path, open_history, resolve_scanner};
use crate::render::{hex_dump, print_outcome};
use crate::{absolutize, load_config_or_default, sha256_file};

/// Inputs for the `scan` command; flags override the config file.
#[derive(Debug, Clone, Default)]
pub struct ScanArgs {
    pub file: PathBuf,
    pub scanner: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub budget_secs: Option<u64>,
    pub interval_ms: Option<u64>,
    pub inconclusive: Option<InconclusivePolicy>,
    pub history_db: Option<PathBuf>,
    pub no_history: bool,
    pub json: bool,
}

/// JSON shape printed by `scan --json`.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub file: String,
    pub sha256: String,
    pub scanner: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex_dump: Option<String>,
}

/// Fold command-line overrides into the loaded config.
pub fn apply_overrides(config: &mut BisectConfig, args: &ScanArgs) {
    if let Some(timeout) = args.timeout_secs {
        config.scanner.timeout_secs = if timeout == 0 { None } else { Some(timeout) };
    }
    if let Some(budget) = args.budget_secs {
        config.engine.budget_secs = Some(budget);
    }
    if let Some(interval) = args.interval_ms {
        config.engine.progress_interval_ms = interval;
    }
    if let Some(policy) = args.inconclusive {
        config.engine.inconclusive = policy;
    }
}

fn console_sink() -> Box<dyn ProgressSink> {
    Box::new(|event: &ProgressEvent| {
        eprintln!(
            "0x{:X} -> 0x{:X} - malicious: {} - {:?}",
            event.low, event.high, event.malicious, event.elapsed
        );
    })
}

/// Locate the bytes of `args.file` that the scanner flags.
pub fn scan_command(args: &ScanArgs) -> Result<()> {
    let mut config = load_config_or_default(args.config.as_deref())?;
    apply_overrides(&mut config, args);

    let file = absolutize(&args.file)?;
    if !file.is_file() {
        return Err(anyhow!("File does not exist: {}", file.display()));
    }
    let scanner_path = resolve_scanner(args.scanner.as_deref(), &config)?;
    debug!(scanner = %scanner_path.display(), "resolved scanner");

    let data = fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let sha256 = sha256_file(&file)?;

    let scanner = config.scanner.command_scanner(&scanner_path);
    let bisector = Bisector::new(&scanner, EngineOptions::from(&config));
    let sink: Box<dyn ProgressSink> =
        if args.json { Box::new(TracingSink) } else { console_sink() };

    let started_at = Utc::now().to_rfc3339();
    let run = bisector.run(&file, &data, sink);
    let finished_at = Utc::now().to_rfc3339();

    if !args.no_history {
        let record = match &run {
            Ok(outcome) => RunRecord::from_outcome(
                file.display().to_string(),
                Some(sha256.clone()),
                data.len() as u64,
                scanner_path.display().to_string(),
                outcome,
                started_at,
                finished_at,
            ),
            Err(e) => {
                let (iterations, scans) = e.counts();
                RunRecord::failed(
                    file.display().to_string(),
                    Some(sha256.clone()),
                    data.len() as u64,
                    scanner_path.display().to_string(),
                    e.to_string(),
                    started_at,
                    finished_at,
                )
                .with_counts(iterations as u64, scans as u64)
            }
        };
        record_run(&history_db_path(args.history_db.as_deref(), &config), &record);
    }

    let outcome = run.context("Bisection failed")?;

    if args.json {
        let hex_dump = match &outcome {
            Outcome::Localized(result) => {
                Some(hex_dump(result.window_bytes(&data), result.window.start))
            }
            Outcome::NotMalicious { .. } => None,
        };
        let summary = ScanSummary {
            file: file.display().to_string(),
            sha256,
            scanner: scanner_path.display().to_string(),
            outcome,
            hex_dump,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let name = scanner_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| scanner_path.display().to_string());
        print_outcome(&name, &outcome, &data);
    }

    Ok(())
}

/// History is bookkeeping; a failure to record never fails the scan.
fn record_run(db_path: &Path, record: &RunRecord) {
    let recorded = open_history(db_path).and_then(|history| {
        history.insert_run(record).context("Failed to insert run record")
    });
    if let Err(e) = recorded {
        warn!("{:#}", e);
    }
}
