use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use bisect_core::config::{BisectConfig, DEFAULT_HISTORY_DB};
use bisect_core::db::RunHistory;

use crate::load_config_or_default;

/// History database location: explicit flag, then config, then the default.
pub fn history_db_path(explicit: Option<&Path>, config: &BisectConfig) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.history_db.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DB))
}

/// Open (creating if needed) the history database, including its parent directory.
pub fn open_history(path: &Path) -> Result<RunHistory> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    RunHistory::open(path)
        .with_context(|| format!("Failed to open history database at {}", path.display()))
}

/// List recorded runs, newest first.
pub fn history_command(
    db: Option<&Path>,
    config_path: Option<&Path>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config_or_default(config_path)?;
    let db_path = history_db_path(db, &config);
    let history = open_history(&db_path)?;
    let runs = history.list_runs(limit).context("Failed to list runs")?;

    if json {
        let serialized =
            serde_json::to_string_pretty(&runs).context("Failed to serialize runs to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Runs ({}):", runs.len());
    if runs.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for run in runs {
        let offset = run
            .localized_offset
            .map(|o| format!("0x{:X}", o))
            .unwrap_or_else(|| "-".to_string());
        let signatures =
            if run.signatures.is_empty() { "-".to_string() } else { run.signatures.join(", ") };
        println!(
            "  - {} [{}] offset={} scans={} signatures={} at {}",
            run.file_path,
            run.status.as_str(),
            offset,
            run.scans,
            signatures,
            run.started_at
        );
        if let Some(error) = run.error {
            println!("      error: {}", error);
        }
    }
    Ok(())
}
