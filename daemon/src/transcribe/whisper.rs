//! Whisper transcription backend.
//!
//! Uses whisper.cpp via whisper-rs. The `faster-whisper` engine kind runs the
//! same runtime with beam search.

use super::{ComputeDevice, ModelBackend, Transcriber};
use crate::audio::{TARGET_SAMPLE_RATE, read_wav};
use crate::engine::EngineType;
use crate::models::{ModelId, ModelManager, WhisperSize};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const BEAM_SIZE: i32 = 5;

/// whisper.cpp was linked with a GPU backend.
const GPU_BACKEND: bool = cfg!(any(
    feature = "whisper-cuda",
    feature = "whisper-vulkan",
    feature = "whisper-hipblas"
));

/// Decoding flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperVariant {
    /// Greedy sampling.
    Whisper,
    /// Beam search, beam size 5.
    FasterWhisper,
}

impl WhisperVariant {
    fn strategy(&self) -> SamplingStrategy {
        match self {
            WhisperVariant::Whisper => SamplingStrategy::Greedy { best_of: 1 },
            WhisperVariant::FasterWhisper => SamplingStrategy::BeamSearch {
                beam_size: BEAM_SIZE,
                patience: -1.0,
            },
        }
    }
}

/// whisper.cpp model of a given size, fetched on first load.
pub struct WhisperBackend {
    variant: WhisperVariant,
    model_size: String,
    models: ModelManager,
}

impl WhisperBackend {
    pub fn new(
        variant: WhisperVariant,
        model_size: impl Into<String>,
        models: ModelManager,
    ) -> Self {
        Self {
            variant,
            model_size: model_size.into(),
            models,
        }
    }

    fn model_file(&self) -> Result<PathBuf> {
        let size = WhisperSize::from_name(&self.model_size)
            .with_context(|| format!("Unknown Whisper model size '{}'", self.model_size))?;
        self.models.ensure_model_blocking(ModelId::Whisper(size))
    }
}

impl ModelBackend for WhisperBackend {
    fn engine_type(&self) -> EngineType {
        EngineType::Whisper
    }

    fn model_name(&self) -> String {
        self.model_size.clone()
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(&self, device: ComputeDevice) -> Result<Box<dyn Transcriber>> {
        // whisper.cpp quietly runs on the CPU when asked for a GPU it was not built for.
        if device == ComputeDevice::Accelerated && !GPU_BACKEND {
            anyhow::bail!("whisper.cpp was built without a GPU backend");
        }
        let path = self.model_file()?;
        Ok(Box::new(WhisperTranscriber::new(&path, self.variant, device)?))
    }
}

/// Whisper speech-to-text transcriber.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    variant: WhisperVariant,
}

impl WhisperTranscriber {
    pub fn new(model_path: &Path, variant: WhisperVariant, device: ComputeDevice) -> Result<Self> {
        info!(
            path = %model_path.display(),
            variant = ?variant,
            device = %device,
            "Loading Whisper model"
        );

        let mut params = WhisperContextParameters::default();
        params.use_gpu(device == ComputeDevice::Accelerated);

        let ctx = WhisperContext::new_with_params(
            model_path.to_str().context("Invalid model path")?,
            params,
        )
        .context("Failed to load Whisper model")?;

        info!("Whisper model loaded successfully");
        Ok(Self { ctx, variant })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, wav: &Path, language: &str) -> Result<Vec<String>> {
        let (audio, sample_rate) = read_wav(wav)?;
        if sample_rate != TARGET_SAMPLE_RATE {
            anyhow::bail!("Whisper expects 16kHz audio, got {}Hz", sample_rate);
        }

        debug!(
            samples = audio.len(),
            duration_secs = audio.len() as f32 / sample_rate as f32,
            "Transcribing audio with Whisper"
        );

        let mut state = self
            .ctx
            .create_state()
            .context("Failed to create Whisper state")?;

        let mut params = FullParams::new(self.variant.strategy());
        params.set_language(Some(language));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio)
            .context("Whisper inference failed")?;

        let mut segments = Vec::new();
        for i in 0..state.full_n_segments() {
            if let Some(segment) = state.get_segment(i) {
                if let Ok(text) = segment.to_str_lossy() {
                    segments.push(text.trim().to_string());
                }
            }
        }

        debug!(segments = segments.len(), "Transcription complete");
        Ok(segments)
    }
}
