//! Console rendering of bisection outcomes.

use std::fmt::Write as _;

use bisect_core::engine::{BisectionResult, Outcome};

/// Shown in place of a signature when the scanner named none.
pub const NO_SIGNATURE: &str = "No signature found";

const ROW: usize = 16;

/// Classic hex dump: offset, two groups of eight bytes, printable ASCII column.
/// Offsets are labelled relative to `base` so they match positions in the file.
pub fn hex_dump(bytes: &[u8], base: usize) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(ROW).enumerate() {
        let _ = write!(out, "{:08x}  ", base + row * ROW);
        for i in 0..ROW {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}

/// Human-readable summary for a localized result.
pub fn localized_lines(result: &BisectionResult, data: &[u8]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Isolated bad bytes at offset 0x{:X} in the file [approximately {} / {} bytes]",
            result.localized_offset, result.localized_offset, result.file_len
        ),
        String::new(),
    ];
    let dump = hex_dump(result.window_bytes(data), result.window.start);
    lines.extend(dump.lines().map(String::from));
    lines.push(String::new());
    if result.signatures.is_empty() {
        lines.push(NO_SIGNATURE.to_string());
    } else {
        lines.extend(result.signatures.iter().cloned());
    }
    lines
}

/// Print an outcome the way the `scan` command shows it.
pub fn print_outcome(scanner_name: &str, outcome: &Outcome, data: &[u8]) {
    let stats = outcome.stats();
    println!();
    match outcome {
        Outcome::NotMalicious { .. } => {
            println!("Not malicious");
        }
        Outcome::Localized(result) => {
            println!("{} - {:?}", scanner_name, stats.elapsed);
            for line in localized_lines(result, data) {
                println!("{line}");
            }
        }
    }
    println!("Scans: {} ({} bisection steps)", stats.scans, stats.iterations);
}
