use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use bisect_core::config::{render_config, BisectConfig};

/// Write a config file populated with defaults (JSON, or YAML for `.yaml`/`.yml`).
pub fn init_config_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let body = render_config(&BisectConfig::default(), path)?;
    fs::write(path, body)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
