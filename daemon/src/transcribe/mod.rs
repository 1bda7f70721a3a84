//! In-process speech-to-text models.
//!
//! A [`ModelBackend`] knows where a model comes from and how to load it on a
//! given device; loading yields a [`Transcriber`] that turns a recorded WAV
//! file into text segments.

use crate::engine::EngineType;
use anyhow::Result;
use std::fmt;
use std::path::Path;

pub mod filter;
#[cfg(feature = "parakeet")]
mod parakeet;
#[cfg(feature = "whisper")]
mod whisper;

pub use filter::{filter_non_speech, join_segments};
#[cfg(feature = "parakeet")]
pub use parakeet::{ParakeetBackend, ParakeetTranscriber};
#[cfg(feature = "whisper")]
pub use whisper::{WhisperBackend, WhisperTranscriber, WhisperVariant};

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    /// GPU execution (CUDA / Vulkan, whichever the build links).
    Accelerated,
    Cpu,
}

impl ComputeDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeDevice::Accelerated => "gpu",
            ComputeDevice::Cpu => "cpu",
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speech-to-text transcriber.
pub trait Transcriber: Send {
    /// Transcribe a 16 kHz mono 16-bit WAV file.
    ///
    /// Returns the raw text segments in order; filtering is up to the caller.
    fn transcribe(&mut self, wav: &Path, language: &str) -> Result<Vec<String>>;
}

/// A loadable recognition model.
pub trait ModelBackend: Send {
    fn engine_type(&self) -> EngineType;

    fn model_name(&self) -> String;

    /// Whether this build can run the model at all.
    fn is_available(&self) -> bool;

    /// Fetch the model if needed and load it on `device`.
    fn load(&self, device: ComputeDevice) -> Result<Box<dyn Transcriber>>;
}

/// Stand-in for a model whose runtime was left out of this build.
///
/// Reports itself unavailable so the engine enters `Error` on `start()`.
pub struct MissingRuntime {
    engine_type: EngineType,
    model_name: String,
    feature: &'static str,
}

impl MissingRuntime {
    pub fn new(
        engine_type: EngineType,
        model_name: impl Into<String>,
        feature: &'static str,
    ) -> Self {
        Self {
            engine_type,
            model_name: model_name.into(),
            feature,
        }
    }
}

impl ModelBackend for MissingRuntime {
    fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    fn is_available(&self) -> bool {
        false
    }

    fn load(&self, _device: ComputeDevice) -> Result<Box<dyn Transcriber>> {
        anyhow::bail!("built without the `{}` feature", self.feature)
    }
}
