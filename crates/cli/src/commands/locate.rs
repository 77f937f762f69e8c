use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use bisect_core::config::BisectConfig;
use bisect_core::scanner::discover_scanner;

use crate::load_config_or_default;

/// Pick the scanner: an explicit path wins, otherwise probe configured candidates.
pub fn resolve_scanner(explicit: Option<&Path>, config: &BisectConfig) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(anyhow!("Scanner not found at {}", path.display()));
        }
        return Ok(path.to_path_buf());
    }
    discover_scanner(config.scanner.candidates()).ok_or_else(|| {
        anyhow!(
            "Could not find a scanner. Checked: {}. Pass --scanner <path> or set scanner.primary_path in the config.",
            config
                .scanner
                .candidates()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

/// Show which candidate scanner paths exist and which one would be used.
pub fn locate_scanner_command(config_path: Option<&Path>) -> Result<()> {
    let config = load_config_or_default(config_path)?;
    println!("Scanner candidates:");
    for candidate in config.scanner.candidates() {
        let exists = candidate.is_file();
        println!("- {} ({})", if exists { "OK" } else { "MISSING" }, candidate.display());
    }
    let chosen = resolve_scanner(None, &config)?;
    println!("Using: {}", chosen.display());
    Ok(())
}
