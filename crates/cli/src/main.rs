use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sigbisect::commands::{
    history_command, init_config_command, locate_scanner_command, scan_command, ScanArgs,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Isolate the bytes of a file that an antivirus signature fires on.
///
/// This CLI is a thin wrapper around `bisect-core` (exposed in code as `bisect_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "sigbisect",
    version,
    about = "Localize antivirus signature hits by prefix bisection",
    long_about = None
)]
struct Cli {
    /// Log every bisection step (overridden by RUST_LOG).
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a file and, if flagged, bisect it down to the offending offset.
    Scan {
        /// File to analyze.
        file: PathBuf,

        /// Scanner executable. If omitted, configured candidate paths are probed.
        #[arg(long)]
        scanner: Option<PathBuf>,

        /// Config file (JSON, or YAML for .yaml/.yml).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Per-scan timeout in seconds (0 disables).
        #[arg(long)]
        timeout: Option<u64>,

        /// Wall-clock budget for the whole search in seconds.
        #[arg(long)]
        budget: Option<u64>,

        /// Progress reporting interval in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// What to do with scans that produce no usable verdict:
        /// treat_as_clean, retry, or abort.
        #[arg(long)]
        inconclusive: Option<bisect_core::config::InconclusivePolicy>,

        /// History database path (defaults to the config value or .sigbisect/history.db).
        #[arg(long)]
        history_db: Option<PathBuf>,

        /// Do not record this run in the history database.
        #[arg(long, default_value_t = false)]
        no_history: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show which configured scanner paths exist and which would be used.
    LocateScanner {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a config file populated with defaults.
    InitConfig {
        #[arg(long, default_value = "sigbisect.json")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List recorded runs, newest first.
    History {
        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Show at most this many runs.
        #[arg(long)]
        limit: Option<usize>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    // RUST_LOG wins; otherwise --debug selects per-step logging.
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("sigbisect=debug,bisect_core=debug")
    } else {
        EnvFilter::new("sigbisect=info,bisect_core=info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    debug!("bisect-core v{}", bisect_core::version());

    match cli.command {
        Command::Scan {
            file,
            scanner,
            config,
            timeout,
            budget,
            interval_ms,
            inconclusive,
            history_db,
            no_history,
            json,
        } => scan_command(&ScanArgs {
            file,
            scanner,
            config,
            timeout_secs: timeout,
            budget_secs: budget,
            interval_ms,
            inconclusive,
            history_db,
            no_history,
            json,
        })?,
        Command::LocateScanner { config } => locate_scanner_command(config.as_deref())?,
        Command::InitConfig { path, force } => init_config_command(&path, force)?,
        Command::History { db, config, limit, json } => {
            history_command(db.as_deref(), config.as_deref(), limit, json)?
        }
    }

    Ok(())
}
