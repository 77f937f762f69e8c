#![cfg(unix)]

use std::path::Path;
use std::time::{Duration, Instant};

use bisect_core::scanner::{CommandScanner, ScanError, Scanner};
use bisect_core::verdict::{ReportMarkers, Verdict};

fn sh(script: &str) -> CommandScanner {
    CommandScanner::new("/bin/sh").with_args(vec![
        "-c".into(),
        script.into(),
        "sh".into(),
        "{target}".into(),
    ])
}

#[test]
fn captures_stdout_of_scanner_process() {
    let scanner = sh(r#"echo "$1 detected HEUR:Trojan.Win32.Agent (suspicion)""#);
    let report = scanner.scan(Path::new("/tmp/candidate.exe")).expect("scan");
    assert_eq!(
        report.raw_text().trim(),
        "/tmp/candidate.exe detected HEUR:Trojan.Win32.Agent (suspicion)"
    );
    let verdict = ReportMarkers::default().classify(&report);
    assert_eq!(verdict, Verdict::Malicious { signature: Some("HEUR:Trojan.Win32.Agent".into()) });
}

#[test]
fn non_zero_exit_still_returns_output() {
    let scanner = sh("echo 'Detected: 0'; echo 'oops' >&2; exit 3");
    let report = scanner.scan(Path::new("x")).expect("scan");
    assert_eq!(report.raw_text(), "Detected: 0\n");
}

#[test]
fn silent_failure_yields_empty_report() {
    let scanner = sh("exit 1");
    let report = scanner.scan(Path::new("x")).expect("scan");
    assert!(report.raw_text().is_empty());
    assert!(matches!(ReportMarkers::default().classify(&report), Verdict::Inconclusive(_)));
}

#[test]
fn hung_scanner_is_killed_after_timeout() {
    let scanner = sh("sleep 10").with_timeout(Some(Duration::from_millis(200)));
    let started = Instant::now();
    let err = scanner.scan(Path::new("x")).unwrap_err();
    assert!(matches!(err, ScanError::TimedOut(_)), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn missing_executable_is_a_spawn_error() {
    let scanner = CommandScanner::new("/definitely/not/a/scanner");
    let err = scanner.scan(Path::new("x")).unwrap_err();
    assert!(matches!(err, ScanError::Spawn { .. }));
}

#[test]
fn lingering_descendant_holding_stdout_still_times_out() {
    let scanner =
        sh("echo 'Detected: 0'; sleep 6 &").with_timeout(Some(Duration::from_millis(300)));
    let started = Instant::now();
    let err = scanner.scan(Path::new("x")).unwrap_err();
    assert!(matches!(err, ScanError::TimedOut(_)), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
}

#[test]
fn timeout_kills_processes_spawned_by_scanner() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let marker = tmp.path().join("survivor");
    // The background job writes the marker only if it outlives the timeout.
    let scanner = sh(r#"(sleep 1; touch "$1") & wait"#)
        .with_timeout(Some(Duration::from_millis(200)));
    let err = scanner.scan(&marker).unwrap_err();
    assert!(matches!(err, ScanError::TimedOut(_)), "got {err}");

    std::thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists(), "a descendant survived the timeout");
}

#[test]
fn fast_scanner_with_timeout_returns_full_output() {
    let scanner = sh("echo 'Processed objects: 1'; echo 'Detected: 0'")
        .with_timeout(Some(Duration::from_secs(5)));
    let report = scanner.scan(Path::new("x")).expect("scan");
    assert_eq!(report.raw_text(), "Processed objects: 1\nDetected: 0\n");
}
