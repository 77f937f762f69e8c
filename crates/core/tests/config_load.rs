use std::path::PathBuf;
use std::time::Duration;

use bisect_core::config::{
    load_config, render_config, BisectConfig, InconclusivePolicy, DEFAULT_ALTERNATE_PATH,
    DEFAULT_PRIMARY_PATH,
};
use bisect_core::engine::EngineOptions;
use tempfile::tempdir;

#[test]
fn defaults_match_console_scanner() {
    let config = BisectConfig::default();
    assert_eq!(config.scanner.args, vec!["SCAN", "{target}", "/i0"]);
    assert_eq!(config.markers.suspicion, "suspicion");
    assert_eq!(config.markers.signature_prefix, "HEUR:");
    assert_eq!(config.engine.progress_interval(), Duration::from_secs(2));
    assert_eq!(config.engine.inconclusive, InconclusivePolicy::Retry);
    assert_eq!(
        config.scanner.candidates(),
        vec![PathBuf::from(DEFAULT_PRIMARY_PATH), PathBuf::from(DEFAULT_ALTERNATE_PATH)]
    );
}

#[test]
fn partial_yaml_overrides_only_given_keys() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("sigbisect.yaml");
    std::fs::write(
        &path,
        "scanner:\n  primary_path: /opt/av/scan\n  alternate_path: ''\n  extra_candidates: [/usr/bin/scan]\n  timeout_secs: 5\nengine:\n  inconclusive: treat_as_clean\n  budget_secs: 600\n",
    )
    .unwrap();

    let config = load_config(&path).expect("load yaml");
    assert_eq!(
        config.scanner.candidates(),
        vec![PathBuf::from("/opt/av/scan"), PathBuf::from("/usr/bin/scan")]
    );
    assert_eq!(config.scanner.timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.engine.inconclusive, InconclusivePolicy::TreatAsClean);
    assert_eq!(config.engine.budget(), Some(Duration::from_secs(600)));
    assert_eq!(config.engine.max_retries, 2);
    assert_eq!(config.markers.suspicion, "suspicion");

    let options = EngineOptions::from(&config);
    assert_eq!(options.budget, Some(Duration::from_secs(600)));
    assert_eq!(options.inconclusive, InconclusivePolicy::TreatAsClean);
}

#[test]
fn json_round_trips_through_render() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("sigbisect.json");
    let mut config = BisectConfig::default();
    config.markers.suspicion = "FOUND".into();
    config.history_db = Some("runs.db".into());
    std::fs::write(&path, render_config(&config, &path).unwrap()).unwrap();

    assert_eq!(load_config(&path).unwrap(), config);
}

#[test]
fn malformed_config_reports_context() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config JSON"));
}

#[test]
fn policy_parses_from_cli_spellings() {
    assert_eq!("retry".parse::<InconclusivePolicy>(), Ok(InconclusivePolicy::Retry));
    assert_eq!(
        "treat-as-clean".parse::<InconclusivePolicy>(),
        Ok(InconclusivePolicy::TreatAsClean)
    );
    assert_eq!("abort".parse::<InconclusivePolicy>(), Ok(InconclusivePolicy::Abort));
    assert!("sometimes".parse::<InconclusivePolicy>().is_err());
}

#[test]
fn scanner_config_builds_command_scanner() {
    let mut config = BisectConfig::default();
    config.scanner.timeout_secs = None;
    let scanner = config.scanner.command_scanner("/opt/av/scan");
    assert_eq!(scanner.executable, PathBuf::from("/opt/av/scan"));
    assert_eq!(scanner.timeout, None);
    assert_eq!(
        scanner.render_args(std::path::Path::new("/tmp/c.exe")),
        vec!["SCAN", "/tmp/c.exe", "/i0"]
    );
}
