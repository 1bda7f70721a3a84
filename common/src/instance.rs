//! Single-instance protocol: a PID lock record per scope plus a toggle signal.
//!
//! A second invocation looks up the PID recorded for a scope and, if that
//! process is alive, asks it to toggle dictation by delivering `SIGUSR1`.
//! Records left behind by crashed processes are pruned on read.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

/// Scope used by regular (foreground) instances.
pub const DEFAULT_SCOPE: &str = "linvoc";

/// Scope used by instances started with `--daemon`.
pub const DAEMON_SCOPE: &str = "linvoc-daemon";

/// Signal a running instance interprets as "toggle dictation now".
pub const TOGGLE_SIGNAL: Signal = Signal::SIGUSR1;

/// Lock records stored as `<dir>/<scope>.lock`, each holding a decimal PID.
#[derive(Debug, Clone)]
pub struct InstanceLock {
    dir: PathBuf,
}

impl InstanceLock {
    /// Lock records stored in a specific directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Lock records stored in the system temporary directory.
    pub fn system() -> Self {
        Self::new(crate::dirs::lock_dir())
    }

    /// Directory holding the lock records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the lock record for `scope`.
    pub fn lock_path(&self, scope: &str) -> PathBuf {
        let safe_scope = scope.replace(std::path::MAIN_SEPARATOR, "_");
        self.dir.join(format!("{safe_scope}.lock"))
    }

    /// PID of the live instance holding `scope`, if any.
    ///
    /// A record that cannot be parsed or names a process that is gone is
    /// deleted and reported as absent.
    pub fn get_running_pid(&self, scope: &str) -> Option<u32> {
        let path = self.lock_path(scope);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return None,
        };

        match parse_pid(&content) {
            Some(pid) if is_process_alive(pid) => Some(pid),
            parsed => {
                warn!(
                    path = %path.display(),
                    pid = ?parsed,
                    "Removing stale lock record"
                );
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!(error = %e, "Failed to remove stale lock record");
                }
                None
            }
        }
    }

    /// Record the current process as the holder of `scope`.
    pub fn create_lock(&self, scope: &str) -> Result<()> {
        let path = self.lock_path(scope);
        let pid = std::process::id();
        std::fs::write(&path, pid.to_string())
            .with_context(|| format!("Failed to write lock file: {}", path.display()))?;
        info!(pid = pid, path = %path.display(), "Wrote lock file");
        Ok(())
    }

    /// Remove the record for `scope`. A missing record is not an error.
    pub fn remove_lock(&self, scope: &str) -> Result<()> {
        let path = self.lock_path(scope);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove lock file: {}", path.display())),
        }
    }
}

/// Parse a lock record. PIDs that would address a process group are rejected.
fn parse_pid(content: &str) -> Option<u32> {
    let pid: i32 = content.trim().parse().ok()?;
    (pid > 0).then_some(pid as u32)
}

/// Check whether `pid` names a process we can signal.
///
/// Processes owned by another user count as gone: they could not be toggled anyway.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), None).is_ok()
}

/// Ask the instance running as `pid` to toggle dictation.
///
/// Returns false if the process has disappeared or we may not signal it.
pub fn send_toggle_signal(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), TOGGLE_SIGNAL) {
        Ok(()) => {
            debug!(pid = pid, "Sent toggle signal");
            true
        }
        Err(e) => {
            warn!(pid = pid, error = %e, "Failed to send toggle signal");
            false
        }
    }
}

#[cfg(test)]
#[path = "instance_test.rs"]
mod tests;
