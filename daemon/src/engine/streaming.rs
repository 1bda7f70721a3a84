//! Streaming dictation through nerd-dictation.
//!
//! nerd-dictation runs VOSK on the microphone and types as it recognizes, so
//! this engine only manages the recognizer process.

use super::{DictationState, EngineCallbacks, StateCell};
use crate::environment::{EnvironmentProbe, SessionType};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Grace period between SIGTERM and SIGKILL.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// File present at the root of every VOSK model.
const MODEL_MARKER: &str = "am/final.mdl";

/// Where VOSK models are looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSearch {
    /// Scanned in order.
    pub default_dirs: Vec<PathBuf>,
    /// Returned when nothing else matches.
    pub fallback: PathBuf,
}

impl ModelSearch {
    /// `~/.config/nerd-dictation/model`, then `~/.local/share/vosk`.
    pub fn user_default() -> Self {
        let fallback = linvoc_common::dirs::user_config_home()
            .map(|home| home.join("nerd-dictation").join("model"))
            .unwrap_or_else(|_| PathBuf::from("nerd-dictation/model"));
        let mut default_dirs = vec![fallback.clone()];
        if let Ok(data_home) = linvoc_common::dirs::user_data_home() {
            default_dirs.push(data_home.join("vosk"));
        }
        Self {
            default_dirs,
            fallback,
        }
    }
}

/// Dictation engine backed by a nerd-dictation subprocess.
pub struct StreamingEngine {
    language: String,
    model_dir: Option<PathBuf>,
    search: ModelSearch,
    probe: Arc<EnvironmentProbe>,
    state: StateCell,
    child: Option<Child>,
    stop_timeout: Duration,
}

impl StreamingEngine {
    pub fn new(
        language: impl Into<String>,
        model_dir: Option<PathBuf>,
        probe: Arc<EnvironmentProbe>,
        callbacks: EngineCallbacks,
    ) -> Self {
        Self {
            language: language.into(),
            model_dir,
            search: ModelSearch::user_default(),
            probe,
            state: StateCell::new(callbacks.on_state_change),
            child: None,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    /// Look for models in `search` instead of the user's directories.
    pub fn with_model_search(mut self, search: ModelSearch) -> Self {
        self.search = search;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn state(&self) -> DictationState {
        self.state.get()
    }

    /// VOSK model directory for the configured language.
    ///
    /// An explicit directory wins if it exists. Otherwise each default
    /// directory is searched for a subdirectory named after the language, then
    /// checked for being a model itself; the fixed fallback comes last.
    pub fn get_model_path(&self) -> PathBuf {
        if let Some(dir) = self.model_dir.as_ref().filter(|dir| dir.is_dir()) {
            return dir.clone();
        }

        let language = self.language.to_lowercase();
        for base in self.search.default_dirs.iter().filter(|dir| dir.is_dir()) {
            if let Some(dir) = language_subdir(base, &language) {
                return dir;
            }
            if base.join(MODEL_MARKER).exists() {
                return base.clone();
            }
        }

        self.search.fallback.clone()
    }

    pub fn is_model_available(&self) -> bool {
        self.get_model_path().is_dir()
    }

    pub fn is_available(&self) -> bool {
        self.probe.has_nerd_dictation() && self.is_model_available()
    }

    fn simulate_input_tool(&self) -> &'static str {
        if self.probe.session_type() == SessionType::Wayland && self.probe.has_ydotool() {
            "YDOTOOL"
        } else {
            "XDOTOOL"
        }
    }

    pub fn start(&mut self) -> bool {
        if self.state.is(DictationState::Recording) {
            return false;
        }

        let Some(program) = self.probe.find_executable("nerd-dictation") else {
            error!("nerd-dictation not found");
            self.state.set(DictationState::Error);
            return false;
        };

        let model_path = self.get_model_path();
        let tool = self.simulate_input_tool();
        info!(
            model = %model_path.display(),
            tool = tool,
            "Starting nerd-dictation"
        );

        let spawned = Command::new(&program)
            .arg("begin")
            .arg("--vosk-model-dir")
            .arg(&model_path)
            .args(["--config", "", "--output", "SIMULATE_INPUT"])
            .args(["--simulate-input-tool", tool, "--verbose", "1"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn();

        match spawned {
            Ok(child) => {
                debug!(pid = child.id(), "nerd-dictation started");
                self.child = Some(child);
                self.state.set(DictationState::Recording);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to launch nerd-dictation");
                self.state.set(DictationState::Error);
                false
            }
        }
    }

    pub fn stop(&mut self) -> String {
        if !self.state.is(DictationState::Recording) {
            return String::new();
        }

        self.state.set(DictationState::Processing);
        if let Some(child) = self.child.take() {
            terminate(child, self.stop_timeout);
        }
        self.state.set(DictationState::Idle);
        String::new()
    }
}

impl Drop for StreamingEngine {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            terminate(child, self.stop_timeout);
        }
    }
}

fn language_subdir(base: &Path, language: &str) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs.into_iter().find(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase().contains(language))
            .unwrap_or(false)
    })
}

/// SIGTERM the process group, escalating to SIGKILL after `timeout`.
fn terminate(mut child: Child, timeout: Duration) {
    let group = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(group, Signal::SIGTERM) {
        debug!(error = %e, "SIGTERM to recognizer group failed");
    }

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(status = %status, "nerd-dictation exited");
                return;
            }
            Ok(None) if Instant::now() < deadline => std::thread::sleep(EXIT_POLL_INTERVAL),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to poll nerd-dictation");
                break;
            }
        }
    }

    warn!("nerd-dictation did not exit, killing");
    let _ = killpg(group, Signal::SIGKILL);
    let _ = child.kill();
    let _ = child.wait();
}
