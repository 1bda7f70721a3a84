//! Clipboard paste injection.
//!
//! The text is placed on the clipboard, a paste keystroke is simulated, and
//! the previous clipboard content is put back shortly afterwards. Works under
//! Wayland compositors that refuse synthetic typing.

use super::{BackendKind, InjectionBackend};
use crate::environment::EnvironmentProbe;
use crate::process::{CommandRunner, Invocation};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

const TOOL_TIMEOUT: Duration = Duration::from_secs(2);

/// Settle time between setting the clipboard and pasting.
const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Time the target application gets to read the clipboard before it is restored.
const RESTORE_DELAY: Duration = Duration::from_millis(500);

const CLIPBOARD_READERS: [(&str, &[&str]); 2] = [
    ("wl-paste", &["--no-newline"]),
    ("xclip", &["-selection", "clipboard", "-o"]),
];

const CLIPBOARD_WRITERS: [(&str, &[&str]); 2] = [
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
];

/// Paste keystroke simulators, in the order they are tried.
const PASTE_TOOLS: [(&str, &[&str]); 3] = [
    // KEY_LEFTCTRL (29) and KEY_V (47), press then release.
    ("ydotool", &["key", "29:1", "47:1", "47:0", "29:0"]),
    ("wtype", &["-M", "ctrl", "-k", "v", "-m", "ctrl"]),
    ("xdotool", &["key", "--clearmodifiers", "ctrl+v"]),
];

enum RestoreSignal {
    /// Restore immediately.
    Now,
    /// Drop the restore; a newer injection took over the backup.
    Cancel,
}

/// A clipboard restore waiting for its delay to elapse.
struct PendingRestore {
    backup: String,
    signal: mpsc::Sender<RestoreSignal>,
    handle: JoinHandle<()>,
}

impl PendingRestore {
    fn finish(self, signal: RestoreSignal) -> String {
        // The thread may already be done; a closed channel is fine then.
        let _ = self.signal.send(signal);
        if self.handle.join().is_err() {
            warn!("Clipboard restore thread panicked");
        }
        self.backup
    }
}

/// Injects text by pasting it from the clipboard.
pub struct ClipboardPasteBackend {
    probe: Arc<EnvironmentProbe>,
    runner: Arc<dyn CommandRunner>,
    settle_delay: Duration,
    restore_delay: Duration,
    pending: Mutex<Option<PendingRestore>>,
}

impl ClipboardPasteBackend {
    pub fn new(probe: Arc<EnvironmentProbe>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            probe,
            runner,
            settle_delay: SETTLE_DELAY,
            restore_delay: RESTORE_DELAY,
            pending: Mutex::new(None),
        }
    }

    /// Override the settle and restore delays.
    pub fn with_delays(mut self, settle: Duration, restore: Duration) -> Self {
        self.settle_delay = settle;
        self.restore_delay = restore;
        self
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingRestore>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_clipboard(&self) -> Option<String> {
        CLIPBOARD_READERS.iter().find_map(|(tool, args)| {
            let invocation =
                Invocation::new(*tool, args.iter().copied(), TOOL_TIMEOUT).capturing_stdout();
            match self.runner.run(&invocation) {
                Ok(output) if output.success => Some(output.stdout),
                Ok(_) => None,
                Err(e) => {
                    debug!(tool = tool, error = %e, "Clipboard reader unavailable");
                    None
                }
            }
        })
    }

    fn simulate_paste(&self) -> bool {
        PASTE_TOOLS.iter().any(|(tool, args)| {
            let invocation = Invocation::new(*tool, args.iter().copied(), TOOL_TIMEOUT);
            let pasted = self.runner.succeeds(&invocation);
            debug!(tool = tool, pasted = pasted, "Paste attempt");
            pasted
        })
    }

    /// Backup to restore after this injection.
    ///
    /// A restore still pending belongs to the clipboard as it was before the
    /// previous injection, so it is cancelled and its backup carried over. Once
    /// a restore has run, the user may have copied something newer.
    fn take_backup(&self) -> Option<String> {
        let pending = self.lock_pending().take();
        match pending {
            Some(pending) if !pending.handle.is_finished() => {
                Some(pending.finish(RestoreSignal::Cancel))
            }
            Some(done) => {
                done.finish(RestoreSignal::Cancel);
                self.read_clipboard()
            }
            None => self.read_clipboard(),
        }
    }

    fn schedule_restore(&self, backup: String) {
        let (signal, rx) = mpsc::channel();
        let runner = Arc::clone(&self.runner);
        let delay = self.restore_delay;
        let content = backup.clone();

        let handle = std::thread::spawn(move || match rx.recv_timeout(delay) {
            Ok(RestoreSignal::Now) | Err(RecvTimeoutError::Timeout) => {
                if !write_clipboard(runner.as_ref(), &content) {
                    warn!("Failed to restore clipboard");
                }
            }
            Ok(RestoreSignal::Cancel) | Err(RecvTimeoutError::Disconnected) => {}
        });

        *self.lock_pending() = Some(PendingRestore {
            backup,
            signal,
            handle,
        });
    }
}

fn write_clipboard(runner: &dyn CommandRunner, text: &str) -> bool {
    CLIPBOARD_WRITERS.iter().any(|(tool, args)| {
        let invocation =
            Invocation::new(*tool, args.iter().copied(), TOOL_TIMEOUT).with_stdin(text);
        runner.succeeds(&invocation)
    })
}

impl InjectionBackend for ClipboardPasteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Portal
    }

    fn is_available(&self) -> bool {
        self.probe.has_portal_support()
    }

    fn inject_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }

        let backup = self.take_backup();

        let injected = if write_clipboard(self.runner.as_ref(), text) {
            std::thread::sleep(self.settle_delay);
            let pasted = self.simulate_paste();
            if !pasted {
                warn!("No paste tool succeeded");
            }
            pasted
        } else {
            warn!("Failed to set clipboard content");
            false
        };

        if let Some(content) = backup.filter(|content| !content.is_empty()) {
            self.schedule_restore(content);
        }
        injected
    }

    fn shutdown(&self) {
        let pending = self.lock_pending().take();
        if let Some(pending) = pending {
            debug!("Restoring clipboard before exit");
            pending.finish(RestoreSignal::Now);
        }
    }
}

impl Drop for ClipboardPasteBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "clipboard_test.rs"]
mod tests;
