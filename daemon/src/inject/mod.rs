//! Text injection into the focused window.
//!
//! Two delivery strategies exist: typing through a keystroke simulator
//! ([`CommandBackend`]) and pasting through the clipboard
//! ([`ClipboardPasteBackend`]). [`TextInjector`] picks one for the session and
//! keeps it for the lifetime of the process.

mod clipboard;
mod command;

pub use clipboard::ClipboardPasteBackend;
pub use command::{CommandBackend, TypingTool};

use crate::environment::EnvironmentProbe;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Delay between simulated keystrokes, in milliseconds.
pub const DEFAULT_KEY_DELAY_MS: u32 = 12;

/// The injection backends linvoc knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// `xdotool type` (X11).
    Xdotool,
    /// Clipboard + paste keystroke; works under Wayland without a privileged daemon.
    Portal,
    /// `ydotool type` (Wayland, needs `ydotoold`).
    Ydotool,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Xdotool => "xdotool",
            BackendKind::Portal => "portal",
            BackendKind::Ydotool => "ydotool",
        }
    }

    /// Order in which backends are tried, given the probe's recommendation.
    pub fn priority(recommended: Option<BackendKind>) -> [BackendKind; 3] {
        use BackendKind::*;
        match recommended {
            Some(Portal) => [Portal, Xdotool, Ydotool],
            Some(Xdotool) => [Xdotool, Portal, Ydotool],
            Some(Ydotool) => [Ydotool, Portal, Xdotool],
            None => [Xdotool, Portal, Ydotool],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xdotool" => Ok(BackendKind::Xdotool),
            "portal" => Ok(BackendKind::Portal),
            "ydotool" => Ok(BackendKind::Ydotool),
            other => Err(SelectionError::UnknownBackend(other.to_string())),
        }
    }
}

/// Why no backend could be bound.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown injection backend '{0}' (expected xdotool, portal or ydotool)")]
    UnknownBackend(String),
    #[error("injection backend '{0}' is not available")]
    BackendUnavailable(BackendKind),
    #[error(
        "no text injection backend available; install xdotool (X11) or wl-clipboard and ydotool (Wayland)"
    )]
    NoBackendAvailable,
}

/// One way of delivering text to the focused window.
pub trait InjectionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn is_available(&self) -> bool;

    /// Deliver `text`. Returns false once every fallback of the backend failed.
    fn inject_text(&self, text: &str) -> bool;

    /// Finish deferred work (clipboard restore) before the process exits.
    fn shutdown(&self) {}
}

/// Settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorSettings {
    /// Backend name to use exclusively, or `None` to pick automatically.
    pub forced_backend: Option<String>,
    pub key_delay_ms: u32,
}

impl Default for InjectorSettings {
    fn default() -> Self {
        Self {
            forced_backend: None,
            key_delay_ms: DEFAULT_KEY_DELAY_MS,
        }
    }
}

/// Chooses the injection backend for this session and caches it.
///
/// One `TextInjector` is built at process entry and shared by reference with
/// every component that delivers text.
pub struct TextInjector {
    probe: Arc<EnvironmentProbe>,
    settings: InjectorSettings,
    instance: Mutex<Option<Arc<dyn InjectionBackend>>>,
}

impl TextInjector {
    pub fn new(probe: Arc<EnvironmentProbe>, settings: InjectorSettings) -> Self {
        Self {
            probe,
            settings,
            instance: Mutex::new(None),
        }
    }

    /// Bind a specific backend, bypassing selection.
    pub fn install(&self, backend: Arc<dyn InjectionBackend>) {
        *self.lock_instance() = Some(backend);
    }

    fn lock_instance(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn InjectionBackend>>> {
        self.instance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Instantiate the backend of the given kind.
    pub fn build(&self, kind: BackendKind) -> Arc<dyn InjectionBackend> {
        let runner = self.probe.runner();
        match kind {
            BackendKind::Xdotool => Arc::new(CommandBackend::new(
                TypingTool::Xdotool,
                &self.probe,
                self.settings.key_delay_ms,
            )),
            BackendKind::Ydotool => Arc::new(CommandBackend::new(
                TypingTool::Ydotool,
                &self.probe,
                self.settings.key_delay_ms,
            )),
            BackendKind::Portal => {
                Arc::new(ClipboardPasteBackend::new(Arc::clone(&self.probe), runner))
            }
        }
    }

    /// Select a backend and bind it as this process's instance.
    ///
    /// A forced name is the only candidate; an unknown name and an unavailable
    /// backend are reported as different errors.
    pub fn create(
        &self,
        forced_backend: Option<&str>,
    ) -> Result<Arc<dyn InjectionBackend>, SelectionError> {
        let backend = match forced_backend {
            Some(name) => {
                let kind: BackendKind = name.parse()?;
                let backend = self.build(kind);
                if !backend.is_available() {
                    return Err(SelectionError::BackendUnavailable(kind));
                }
                backend
            }
            None => self.select_automatically()?,
        };

        info!(backend = backend.name(), "Text injection backend selected");
        self.install(Arc::clone(&backend));
        Ok(backend)
    }

    fn select_automatically(&self) -> Result<Arc<dyn InjectionBackend>, SelectionError> {
        let recommended = self.probe.recommended_backend();
        debug!(recommended = ?recommended, "Selecting injection backend");

        BackendKind::priority(recommended)
            .into_iter()
            .map(|kind| self.build(kind))
            .find(|backend| {
                let available = backend.is_available();
                debug!(backend = backend.name(), available = available, "Probed backend");
                available
            })
            .ok_or(SelectionError::NoBackendAvailable)
    }

    /// The bound backend, selecting one on first use.
    pub fn get_instance(&self) -> Result<Arc<dyn InjectionBackend>, SelectionError> {
        if let Some(backend) = self.lock_instance().as_ref() {
            return Ok(Arc::clone(backend));
        }
        self.create(self.settings.forced_backend.as_deref())
    }

    /// Deliver `text` through the bound backend.
    pub fn inject(&self, text: &str) -> bool {
        match self.get_instance() {
            Ok(backend) => backend.inject_text(text),
            Err(e) => {
                warn!(error = %e, "Cannot inject text");
                false
            }
        }
    }

    /// Let the bound backend finish deferred work.
    pub fn shutdown(&self) {
        if let Some(backend) = self.lock_instance().as_ref() {
            backend.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "selector_test.rs"]
mod tests;
