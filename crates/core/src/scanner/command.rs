use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, warn};

use super::{ScanError, ScanReport, Scanner};

/// Substituted with the scan target in the argument template.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// `<scanner> SCAN <target> /i0`: scan a single object without interactive prompts.
pub const DEFAULT_SCAN_ARGS: [&str; 3] = ["SCAN", TARGET_PLACEHOLDER, "/i0"];

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Scanner backed by an external console executable.
///
/// Only standard output is captured. The exit status is logged but never
/// interpreted: console scanners commonly exit non-zero when they find something.
#[derive(Debug, Clone)]
pub struct CommandScanner {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandScanner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: DEFAULT_SCAN_ARGS.iter().map(|a| a.to_string()).collect(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expand the argument template for `target`.
    pub fn render_args(&self, target: &Path) -> Vec<String> {
        let target = target.display().to_string();
        self.args.iter().map(|arg| arg.replace(TARGET_PLACEHOLDER, &target)).collect()
    }
}

impl Scanner for CommandScanner {
    fn scan(&self, target: &Path) -> Result<ScanReport, ScanError> {
        let mut command = Command::new(&self.executable);
        command
            .args(self.render_args(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // Own process group, so a timeout can take down everything the scanner forked.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command
            .spawn()
            .map_err(|source| ScanError::Spawn { path: self.executable.clone(), source })?;

        // Drain stdout on its own thread so a chatty scanner can't fill the pipe
        // while we poll for exit.
        let (stdout_tx, stdout_rx) = bounded::<Vec<u8>>(1);
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stdout.read_to_end(&mut buf);
                let _ = stdout_tx.send(buf);
            });
        }

        let started = Instant::now();
        let deadline = self.timeout.map(|limit| started + limit);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, elapsed = ?started.elapsed(), "scanner exited");
                    break;
                }
                Ok(None) => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        warn!(path = %target.display(), "scanner timed out; killing");
                        terminate(&mut child);
                        return Err(ScanError::TimedOut(self.timeout.unwrap_or_default()));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    terminate(&mut child);
                    return Err(ScanError::Wait(e));
                }
            }
        }

        // A descendant may outlive the scanner and keep stdout open; the same
        // deadline bounds the wait for end-of-output.
        let received = match deadline {
            Some(deadline) => {
                stdout_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => stdout_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let stdout = match received {
            Ok(buf) => buf,
            Err(RecvTimeoutError::Timeout) => {
                warn!(path = %target.display(), "scanner output still open at deadline; killing");
                terminate(&mut child);
                return Err(ScanError::TimedOut(self.timeout.unwrap_or_default()));
            }
            Err(RecvTimeoutError::Disconnected) => Vec::new(),
        };
        Ok(ScanReport::new(String::from_utf8_lossy(&stdout).into_owned()))
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Kill the scanner and whatever it spawned, then reap the direct child.
fn terminate(child: &mut Child) {
    kill_process_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: plain syscall; the group id is the child's pid because it was
    // spawned with `process_group(0)`.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
