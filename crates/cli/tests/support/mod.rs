#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub const SIGNATURE: &str = "HEUR:Trojan.Win32.Fake";

/// Shell snippet standing in for a console scanner: flags files of at least `threshold` bytes.
pub fn threshold_script(threshold: usize) -> String {
    format!(
        r#"size=$(( $(wc -c < "$1") )); if [ "$size" -ge {threshold} ]; then echo "$1    detected    {SIGNATURE} (suspicion)"; else echo "Detected: 0"; fi"#
    )
}

/// Write a config that drives `/bin/sh -c <script> sh <target>` as the scanner.
pub fn write_config(dir: &Path, script: &str) -> PathBuf {
    let config = serde_json::json!({
        "scanner": {
            "primary_path": "/bin/sh",
            "alternate_path": "",
            "args": ["-c", script, "sh", "{target}"],
            "timeout_secs": 20
        },
        "engine": {
            "progress_interval_ms": 10,
            "scratch_dir": dir.join("scratch").display().to_string()
        }
    });
    let path = dir.join("sigbisect.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

pub fn write_sample(dir: &Path, len: usize) -> PathBuf {
    let path = dir.join("sample.exe");
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

pub fn sigbisect() -> Command {
    let mut cmd = cargo_bin_cmd!("sigbisect");
    cmd.env_remove("RUST_LOG");
    cmd
}
