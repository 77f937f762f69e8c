//! bisect-core
//!
//! Core library for localizing which bytes of a file an antivirus signature
//! fires on. The external scanner is treated as a black-box oracle: the engine
//! re-scans shrinking prefixes of the input and bisects until the verdict flips
//! within a single byte.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends. The `sigbisect` CLI is a thin wrapper around it.

pub mod config;
pub mod db;
pub mod engine;
pub mod progress;
pub mod scanner;
pub mod threats;
pub mod verdict;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
