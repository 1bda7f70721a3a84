//! Model download and management.
//!
//! Buffered engines fetch their model on first load. Files land in the
//! linvoc data directory unless a model directory is configured.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const WHISPER_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

const PARAKEET_V3_URL: &str =
    "https://huggingface.co/istupakov/parakeet-tdt-0.6b-v3-onnx/resolve/main";

const PARAKEET_V2_URL: &str =
    "https://huggingface.co/istupakov/parakeet-tdt-0.6b-v2-onnx/resolve/main";

/// Files of a Parakeet ONNX bundle.
pub const PARAKEET_FILES: [&str; 4] = [
    "nemo128.onnx",
    "encoder-model.int8.onnx",
    "decoder_joint-model.int8.onnx",
    "vocab.txt",
];

/// whisper.cpp model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperSize {
    Tiny,
    Base,
    Small,
    Medium,
    /// Served as large-v3.
    Large,
}

impl WhisperSize {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tiny" => Some(WhisperSize::Tiny),
            "base" => Some(WhisperSize::Base),
            "small" => Some(WhisperSize::Small),
            "medium" => Some(WhisperSize::Medium),
            "large" | "large-v3" => Some(WhisperSize::Large),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperSize::Tiny => "tiny",
            WhisperSize::Base => "base",
            WhisperSize::Small => "small",
            WhisperSize::Medium => "medium",
            WhisperSize::Large => "large-v3",
        }
    }
}

/// Parakeet model used when no name is configured.
pub const DEFAULT_PARAKEET_MODEL: &str = "nvidia/parakeet-tdt-0.6b-v3";

/// Identifier for downloadable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelId {
    Whisper(WhisperSize),
    ParakeetTdtV3,
    /// English-only predecessor of v3.
    ParakeetTdtV2,
}

impl ModelId {
    /// Parakeet bundle for a model name such as `nvidia/parakeet-tdt-0.6b-v3`.
    pub fn parakeet(name: &str) -> Option<Self> {
        let short = name.rsplit('/').next().unwrap_or(name);
        match short {
            "parakeet-tdt-0.6b-v3" => Some(ModelId::ParakeetTdtV3),
            "parakeet-tdt-0.6b-v2" => Some(ModelId::ParakeetTdtV2),
            _ => None,
        }
    }

    /// Files making up the model.
    fn files(&self) -> Vec<ModelFile> {
        match self {
            ModelId::Whisper(size) => {
                let (filename, size_bytes) = match size {
                    WhisperSize::Tiny => ("ggml-tiny.bin", 77_691_713),
                    WhisperSize::Base => ("ggml-base.bin", 147_951_465),
                    WhisperSize::Small => ("ggml-small.bin", 487_601_967),
                    WhisperSize::Medium => ("ggml-medium.bin", 1_533_774_781),
                    WhisperSize::Large => ("ggml-large-v3.bin", 3_094_623_691),
                };
                vec![ModelFile {
                    filename: filename.to_string(),
                    url: format!("{WHISPER_BASE_URL}/{filename}"),
                    size_bytes: Some(size_bytes),
                }]
            }
            ModelId::ParakeetTdtV3 | ModelId::ParakeetTdtV2 => {
                let base = match self {
                    ModelId::ParakeetTdtV2 => PARAKEET_V2_URL,
                    _ => PARAKEET_V3_URL,
                };
                PARAKEET_FILES
                    .iter()
                    .map(|filename| ModelFile {
                        filename: filename.to_string(),
                        url: format!("{base}/{filename}"),
                        size_bytes: None,
                    })
                    .collect()
            }
        }
    }

    /// Subdirectory holding a multi-file model.
    fn bundle_dir(&self) -> Option<&'static str> {
        match self {
            ModelId::Whisper(_) => None,
            ModelId::ParakeetTdtV3 => Some("parakeet-tdt-0.6b-v3"),
            ModelId::ParakeetTdtV2 => Some("parakeet-tdt-0.6b-v2"),
        }
    }
}

/// Metadata for a downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelFile {
    filename: String,
    url: String,
    /// Expected file size for validation (optional).
    size_bytes: Option<u64>,
}

/// Local state of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    /// Every file is present; the path to load from.
    Ready(PathBuf),
    Missing,
    /// A file exists with an unexpected size.
    Corrupted {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Manages model downloads and storage.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Use `models_dir`, or `~/.local/share/linvoc/models/` when `None`.
    pub fn new(models_dir: Option<PathBuf>) -> Result<Self> {
        let models_dir = match models_dir {
            Some(dir) => dir,
            None => linvoc_common::dirs::data_dir()?.join("models"),
        };
        Ok(Self { models_dir })
    }

    pub fn with_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path a model is loaded from: the file itself, or the bundle directory.
    pub fn model_path(&self, model: ModelId) -> PathBuf {
        match model.bundle_dir() {
            Some(dir) => self.models_dir.join(dir),
            None => {
                let files = model.files();
                let filename = files.first().map_or("", |file| file.filename.as_str());
                self.models_dir.join(filename)
            }
        }
    }

    fn file_dir(&self, model: ModelId) -> PathBuf {
        match model.bundle_dir() {
            Some(dir) => self.models_dir.join(dir),
            None => self.models_dir.clone(),
        }
    }

    /// Inspect the local copy without downloading.
    pub async fn check_model(&self, model: ModelId) -> ModelStatus {
        let dir = self.file_dir(model);
        for file in model.files() {
            let path = dir.join(&file.filename);
            let Ok(metadata) = fs::metadata(&path).await else {
                return ModelStatus::Missing;
            };
            match file.size_bytes {
                Some(expected) if metadata.len() != expected => {
                    return ModelStatus::Corrupted {
                        path,
                        expected,
                        actual: metadata.len(),
                    };
                }
                _ => {}
            }
        }
        ModelStatus::Ready(self.model_path(model))
    }

    /// Ensure a model is available, downloading what is missing.
    pub async fn ensure_model(&self, model: ModelId) -> Result<PathBuf> {
        let dir = self.file_dir(model);
        for file in model.files() {
            let path = dir.join(&file.filename);
            if self.file_ready(&file, &path).await? {
                debug!(path = %path.display(), "Model file already exists");
                continue;
            }
            self.download_file(&file, &path).await?;
        }
        Ok(self.model_path(model))
    }

    /// Blocking variant of [`ensure_model`](Self::ensure_model) for non-async callers.
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn ensure_model_blocking(&self, model: ModelId) -> Result<PathBuf> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create download runtime")?;
        runtime.block_on(self.ensure_model(model))
    }

    /// Blocking variant of [`check_model`](Self::check_model).
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn check_model_blocking(&self, model: ModelId) -> Result<ModelStatus> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create model check runtime")?;
        Ok(runtime.block_on(self.check_model(model)))
    }

    async fn file_ready(&self, file: &ModelFile, path: &Path) -> Result<bool> {
        let Ok(metadata) = fs::metadata(path).await else {
            return Ok(false);
        };
        match file.size_bytes {
            Some(expected) if metadata.len() != expected => {
                warn!(
                    path = %path.display(),
                    expected = expected,
                    actual = metadata.len(),
                    "Model size mismatch, re-downloading"
                );
                fs::remove_file(path)
                    .await
                    .context("Failed to remove corrupted model")?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// Stream a file to `<dest>.tmp`, then rename it into place.
    async fn download_file(&self, file: &ModelFile, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create models directory")?;
        }

        info!(url = %file.url, dest = %dest.display(), "Downloading model");

        let response = reqwest::get(&file.url)
            .await
            .with_context(|| format!("Failed to download model from {}", file.url))?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to download model: HTTP {}", response.status());
        }

        let temp_path = temp_path_for(dest);
        let mut out = fs::File::create(&temp_path)
            .await
            .context("Failed to create temporary model file")?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read response body")?;
            out.write_all(&chunk)
                .await
                .context("Failed to write model file")?;
            written += chunk.len() as u64;
        }
        out.sync_all().await.context("Failed to sync model file")?;
        drop(out);

        if let Some(expected) = file.size_bytes.filter(|&expected| expected != written) {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!(
                "Downloaded model size mismatch: expected {}, got {}",
                expected,
                written
            );
        }

        fs::rename(&temp_path, dest)
            .await
            .context("Failed to finalize model file")?;

        info!(path = %dest.display(), size = written, "Model downloaded successfully");
        Ok(())
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
