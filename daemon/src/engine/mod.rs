//! Speech engines and their shared lifecycle.
//!
//! Every engine follows the same state machine:
//! `Idle -> Recording -> Processing -> Idle`, with `Error` reachable from
//! `Idle` or `Recording` on a setup fault and cleared by the next `start()`.
//! Engines never hand recognized text back to the caller of `stop()`; text
//! goes to the focused window and to the text-observed callback only.

mod buffered;
mod streaming;

pub use buffered::BufferedEngine;
pub use streaming::{ModelSearch, StreamingEngine};

use crate::transcribe::ComputeDevice;
use std::fmt;
use tracing::{debug, warn};

/// Lifecycle state of a dictation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationState {
    Idle,
    Recording,
    Processing,
    Error,
}

impl DictationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DictationState::Idle => "idle",
            DictationState::Recording => "recording",
            DictationState::Processing => "processing",
            DictationState::Error => "error",
        }
    }
}

impl fmt::Display for DictationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognizer family, as reported to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    Vosk,
    Whisper,
    Parakeet,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Vosk => "vosk",
            EngineType::Whisper => "whisper",
            EngineType::Parakeet => "parakeet",
        }
    }

    /// Upper-case name for display.
    pub fn display_name(&self) -> String {
        self.as_str().to_uppercase()
    }
}

/// Engine requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// nerd-dictation subprocess streaming through VOSK.
    Vosk,
    Whisper,
    FasterWhisper,
    Parakeet,
}

impl EngineKind {
    pub const KEYS: [&'static str; 4] = ["vosk", "whisper", "faster-whisper", "parakeet"];

    /// Parse an engine key; unknown keys select the streaming engine.
    pub fn from_key(key: &str) -> Self {
        match key {
            "vosk" => EngineKind::Vosk,
            "whisper" => EngineKind::Whisper,
            "faster-whisper" | "faster_whisper" => EngineKind::FasterWhisper,
            "parakeet" => EngineKind::Parakeet,
            other => {
                warn!(engine = other, "Unknown engine, falling back to vosk");
                EngineKind::Vosk
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Vosk => "vosk",
            EngineKind::Whisper => "whisper",
            EngineKind::FasterWhisper => "faster-whisper",
            EngineKind::Parakeet => "parakeet",
        }
    }
}

pub type StateCallback = Box<dyn Fn(DictationState) + Send>;
pub type TextCallback = Box<dyn Fn(&str) + Send>;

/// Notifications an engine emits.
#[derive(Default)]
pub struct EngineCallbacks {
    pub on_state_change: Option<StateCallback>,
    /// Receives filtered text after it was handed to the injector.
    pub on_text: Option<TextCallback>,
}

/// Engine state with edge-triggered change notification.
///
/// Assigning the current state again is a no-op and does not notify.
pub struct StateCell {
    state: DictationState,
    on_change: Option<StateCallback>,
}

impl StateCell {
    pub fn new(on_change: Option<StateCallback>) -> Self {
        Self {
            state: DictationState::Idle,
            on_change,
        }
    }

    pub fn get(&self) -> DictationState {
        self.state
    }

    pub fn is(&self, state: DictationState) -> bool {
        self.state == state
    }

    /// Move to `state`. Returns whether a transition happened.
    pub fn set(&mut self, state: DictationState) -> bool {
        if self.state == state {
            return false;
        }
        debug!(from = %self.state, to = %state, "Dictation state changed");
        self.state = state;
        if let Some(callback) = &self.on_change {
            callback(state);
        }
        true
    }
}

/// A dictation engine.
pub enum SpeechEngine {
    /// External recognizer process typing text itself.
    Streaming(StreamingEngine),
    /// In-process model over a recorded buffer.
    Buffered(BufferedEngine),
}

impl SpeechEngine {
    /// Begin recording. Returns false if already recording or setup failed.
    pub fn start(&mut self) -> bool {
        match self {
            SpeechEngine::Streaming(engine) => engine.start(),
            SpeechEngine::Buffered(engine) => engine.start(),
        }
    }

    /// End recording and deliver the text. Always returns an empty string.
    pub fn stop(&mut self) -> String {
        match self {
            SpeechEngine::Streaming(engine) => engine.stop(),
            SpeechEngine::Buffered(engine) => engine.stop(),
        }
    }

    /// Stop when recording, start otherwise.
    ///
    /// Returns the (empty) result of `stop()` when it stopped.
    pub fn toggle(&mut self) -> Option<String> {
        if self.state() == DictationState::Recording {
            Some(self.stop())
        } else {
            self.start();
            None
        }
    }

    pub fn state(&self) -> DictationState {
        match self {
            SpeechEngine::Streaming(engine) => engine.state(),
            SpeechEngine::Buffered(engine) => engine.state(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            SpeechEngine::Streaming(engine) => engine.is_available(),
            SpeechEngine::Buffered(engine) => engine.is_available(),
        }
    }

    /// Whether the model can be used without further setup by the user.
    ///
    /// Buffered engines fetch their model on demand, so only the runtime counts.
    pub fn is_model_available(&self) -> bool {
        match self {
            SpeechEngine::Streaming(engine) => engine.is_model_available(),
            SpeechEngine::Buffered(engine) => engine.is_available(),
        }
    }

    pub fn engine_type(&self) -> EngineType {
        match self {
            SpeechEngine::Streaming(_) => EngineType::Vosk,
            SpeechEngine::Buffered(engine) => engine.engine_type(),
        }
    }

    /// Human-readable model identifier.
    pub fn model_name(&self) -> String {
        match self {
            SpeechEngine::Streaming(engine) => engine.get_model_path().display().to_string(),
            SpeechEngine::Buffered(engine) => engine.model_name(),
        }
    }

    /// Load the model ahead of the first `start()`.
    pub fn preload(&mut self) -> bool {
        match self {
            SpeechEngine::Streaming(_) => true,
            SpeechEngine::Buffered(engine) => engine.preload(),
        }
    }

    /// Device the loaded model runs on, if one is loaded.
    pub fn compute_device(&self) -> Option<ComputeDevice> {
        match self {
            SpeechEngine::Streaming(_) => None,
            SpeechEngine::Buffered(engine) => engine.compute_device(),
        }
    }
}

impl From<StreamingEngine> for SpeechEngine {
    fn from(engine: StreamingEngine) -> Self {
        SpeechEngine::Streaming(engine)
    }
}

impl From<BufferedEngine> for SpeechEngine {
    fn from(engine: BufferedEngine) -> Self {
        SpeechEngine::Buffered(engine)
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
