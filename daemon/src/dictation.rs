//! Engine-agnostic dictation facade.
//!
//! [`DictationManager`] builds one [`SpeechEngine`] from an
//! [`EngineSelection`] and forwards every call to it.

use crate::audio::{AudioSource, MicrophoneSource};
use crate::engine::{
    BufferedEngine, DictationState, EngineCallbacks, EngineKind, EngineType, SpeechEngine,
    StreamingEngine,
};
use crate::environment::EnvironmentProbe;
use crate::inject::TextInjector;
use crate::models::{DEFAULT_PARAKEET_MODEL, ModelId, ModelManager, WhisperSize};
use crate::transcribe::{ComputeDevice, ModelBackend};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Which engine to run and how. Fixed for the lifetime of a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSelection {
    /// Engine key: `vosk`, `whisper`, `faster-whisper` or `parakeet`.
    pub kind: String,
    pub language: String,
    /// Whisper model size hint.
    pub model_size: String,
    /// Explicit model name (Parakeet).
    pub model_name: Option<String>,
    /// VOSK model directory, or model cache directory for buffered engines.
    pub model_dir: Option<PathBuf>,
}

impl Default for EngineSelection {
    fn default() -> Self {
        Self {
            kind: "vosk".to_string(),
            language: "fr".to_string(),
            model_size: "base".to_string(),
            model_name: None,
            model_dir: None,
        }
    }
}

impl EngineSelection {
    /// Parakeet model to load: the explicit name, else the default model.
    pub fn parakeet_model(&self) -> String {
        self.model_name
            .clone()
            .unwrap_or_else(|| DEFAULT_PARAKEET_MODEL.to_string())
    }

    /// Downloadable model this selection loads. `None` for VOSK, whose model the
    /// user installs, and for names no download is known for.
    pub fn model_id(&self) -> Option<ModelId> {
        match EngineKind::from_key(&self.kind) {
            EngineKind::Vosk => None,
            EngineKind::Whisper | EngineKind::FasterWhisper => {
                WhisperSize::from_name(&self.model_size).map(ModelId::Whisper)
            }
            EngineKind::Parakeet => ModelId::parakeet(&self.parakeet_model()),
        }
    }
}

/// Process-wide collaborators shared by the engines.
#[derive(Clone)]
pub struct DictationContext {
    pub probe: Arc<EnvironmentProbe>,
    pub injector: Arc<TextInjector>,
    pub audio: Arc<dyn AudioSource>,
}

impl DictationContext {
    /// Context for this session, capturing from the default microphone.
    pub fn new(probe: Arc<EnvironmentProbe>, injector: Arc<TextInjector>) -> Self {
        Self {
            probe,
            injector,
            audio: Arc::new(MicrophoneSource),
        }
    }
}

/// Owns one speech engine and exposes a uniform lifecycle API.
pub struct DictationManager {
    selection: EngineSelection,
    engine: SpeechEngine,
}

impl DictationManager {
    /// Build the engine named by `selection`.
    ///
    /// Unknown engine keys select the streaming engine.
    pub fn new(
        selection: EngineSelection,
        context: &DictationContext,
        callbacks: EngineCallbacks,
    ) -> Result<Self> {
        let engine = build_engine(&selection, context, callbacks)?;
        info!(
            engine = engine.engine_type().as_str(),
            model = %engine.model_name(),
            language = %selection.language,
            "Dictation engine created"
        );
        Ok(Self { selection, engine })
    }

    /// Wrap an already constructed engine.
    pub fn from_engine(selection: EngineSelection, engine: SpeechEngine) -> Self {
        Self { selection, engine }
    }

    pub fn selection(&self) -> &EngineSelection {
        &self.selection
    }

    pub fn start(&mut self) -> bool {
        self.engine.start()
    }

    /// Always returns an empty string; text goes to the focused window.
    pub fn stop(&mut self) -> String {
        self.engine.stop()
    }

    pub fn toggle(&mut self) -> Option<String> {
        self.engine.toggle()
    }

    pub fn state(&self) -> DictationState {
        self.engine.state()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == DictationState::Recording
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    pub fn is_model_available(&self) -> bool {
        self.engine.is_model_available()
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine.engine_type()
    }

    /// Upper-case engine name, e.g. `WHISPER`.
    pub fn engine_type_name(&self) -> String {
        self.engine.engine_type().display_name()
    }

    pub fn model_name(&self) -> String {
        self.engine.model_name()
    }

    pub fn preload(&mut self) -> bool {
        self.engine.preload()
    }

    pub fn compute_device(&self) -> Option<ComputeDevice> {
        self.engine.compute_device()
    }
}

fn build_engine(
    selection: &EngineSelection,
    context: &DictationContext,
    callbacks: EngineCallbacks,
) -> Result<SpeechEngine> {
    let kind = EngineKind::from_key(&selection.kind);
    if kind == EngineKind::Vosk {
        let engine = StreamingEngine::new(
            selection.language.clone(),
            selection.model_dir.clone(),
            Arc::clone(&context.probe),
            callbacks,
        );
        return Ok(engine.into());
    }

    let models = ModelManager::new(selection.model_dir.clone())?;
    let backend = match kind {
        EngineKind::Parakeet => parakeet_backend(selection.parakeet_model(), models),
        _ => whisper_backend(kind, selection.model_size.clone(), models),
    };

    let engine = BufferedEngine::new(
        selection.language.clone(),
        backend,
        Arc::clone(&context.audio),
        Arc::clone(&context.injector),
        callbacks,
    );
    Ok(engine.into())
}

#[cfg(feature = "whisper")]
fn whisper_backend(kind: EngineKind, size: String, models: ModelManager) -> Box<dyn ModelBackend> {
    use crate::transcribe::{WhisperBackend, WhisperVariant};

    let variant = if kind == EngineKind::FasterWhisper {
        WhisperVariant::FasterWhisper
    } else {
        WhisperVariant::Whisper
    };
    Box::new(WhisperBackend::new(variant, size, models))
}

#[cfg(not(feature = "whisper"))]
fn whisper_backend(
    _kind: EngineKind,
    size: String,
    _models: ModelManager,
) -> Box<dyn ModelBackend> {
    Box::new(crate::transcribe::MissingRuntime::new(
        EngineType::Whisper,
        size,
        "whisper",
    ))
}

#[cfg(feature = "parakeet")]
fn parakeet_backend(name: String, models: ModelManager) -> Box<dyn ModelBackend> {
    Box::new(crate::transcribe::ParakeetBackend::new(name, models))
}

#[cfg(not(feature = "parakeet"))]
fn parakeet_backend(name: String, _models: ModelManager) -> Box<dyn ModelBackend> {
    Box::new(crate::transcribe::MissingRuntime::new(
        EngineType::Parakeet,
        name,
        "parakeet",
    ))
}

#[cfg(test)]
#[path = "dictation_test.rs"]
mod tests;
