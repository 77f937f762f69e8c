#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bisect_core::scanner::{ScanError, ScanReport, Scanner};

pub const CLEAN_REPORT: &str = "Processed objects: 1\nDetected: 0\n";

pub fn detected_report(target: &Path, signature: &str) -> String {
    format!("{}    detected    {} (suspicion)\nDetected: 1\n", target.display(), signature)
}

/// Flags any file whose length is at least `threshold`.
pub struct ThresholdScanner {
    pub threshold: usize,
    pub signature: String,
    pub calls: AtomicUsize,
    pub seen_lengths: Mutex<Vec<usize>>,
}

impl ThresholdScanner {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            signature: "HEUR:Trojan.Win64.Generic".to_string(),
            calls: AtomicUsize::new(0),
            seen_lengths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.seen_lengths.lock().unwrap().clone()
    }
}

impl Scanner for ThresholdScanner {
    fn scan(&self, target: &Path) -> Result<ScanReport, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let len = std::fs::metadata(target).map(|m| m.len() as usize).unwrap_or(0);
        self.seen_lengths.lock().unwrap().push(len);
        if len >= self.threshold {
            Ok(ScanReport::new(detected_report(target, &self.signature)))
        } else {
            Ok(ScanReport::new(CLEAN_REPORT))
        }
    }

    fn name(&self) -> &str {
        "threshold"
    }
}

/// Replays a fixed script of reports, then repeats the last one.
pub struct ScriptedScanner {
    pub script: Mutex<Vec<Result<String, ()>>>,
    pub calls: AtomicUsize,
}

impl ScriptedScanner {
    pub fn new(script: Vec<Result<String, ()>>) -> Self {
        let mut script = script;
        script.reverse();
        Self { script: Mutex::new(script), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scanner for ScriptedScanner {
    fn scan(&self, _target: &Path) -> Result<ScanReport, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 { script.pop() } else { script.last().cloned() };
        match next.unwrap_or(Ok(String::new())) {
            Ok(text) => Ok(ScanReport::new(text)),
            Err(()) => Err(ScanError::TimedOut(std::time::Duration::from_millis(1))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn write_sample(dir: &Path, len: usize) -> std::path::PathBuf {
    let path = dir.join("sample.bin");
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}
