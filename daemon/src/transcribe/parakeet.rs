//! NVIDIA Parakeet TDT transcription backend.
//!
//! Runs the ONNX export of the model (mel preprocessor, encoder, fused
//! decoder/joint network) through ONNX Runtime with greedy TDT decoding.

use super::{ComputeDevice, ModelBackend, Transcriber};
use crate::audio::{TARGET_SAMPLE_RATE, read_wav};
use crate::engine::EngineType;
use crate::models::{ModelId, ModelManager};
use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Array3};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use tracing::{debug, info};

/// Prediction network LSTM: 2 layers, 640 hidden units.
const DECODER_LAYERS: usize = 2;
const DECODER_HIDDEN: usize = 640;

/// Symbols emitted on one encoder frame before moving on.
const MAX_TOKENS_PER_STEP: usize = 10;

const WORD_BOUNDARY: char = '\u{2581}';

/// Parakeet model by name, fetched on first load.
pub struct ParakeetBackend {
    model_name: String,
    models: ModelManager,
}

impl ParakeetBackend {
    pub fn new(model_name: impl Into<String>, models: ModelManager) -> Self {
        Self {
            model_name: model_name.into(),
            models,
        }
    }
}

impl ModelBackend for ParakeetBackend {
    fn engine_type(&self) -> EngineType {
        EngineType::Parakeet
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(&self, device: ComputeDevice) -> Result<Box<dyn Transcriber>> {
        let model = ModelId::parakeet(&self.model_name).with_context(|| {
            format!("No ONNX export known for Parakeet model '{}'", self.model_name)
        })?;
        let dir = self.models.ensure_model_blocking(model)?;
        Ok(Box::new(ParakeetTranscriber::new(&dir, device)?))
    }
}

/// Parakeet TDT speech-to-text transcriber.
pub struct ParakeetTranscriber {
    preprocessor: Session,
    encoder: Session,
    decoder_joint: Session,
    vocab: Vec<String>,
    blank_id: usize,
}

impl ParakeetTranscriber {
    /// Load the ONNX bundle in `dir`.
    pub fn new(dir: &Path, device: ComputeDevice) -> Result<Self> {
        info!(path = %dir.display(), device = %device, "Loading Parakeet model");

        let vocab_text = std::fs::read_to_string(dir.join("vocab.txt"))
            .with_context(|| format!("Failed to read vocabulary in {}", dir.display()))?;
        let (vocab, blank_id) = parse_vocab(&vocab_text)?;

        let transcriber = Self {
            preprocessor: open_session(&dir.join("nemo128.onnx"), device)?,
            encoder: open_session(&dir.join("encoder-model.int8.onnx"), device)?,
            decoder_joint: open_session(&dir.join("decoder_joint-model.int8.onnx"), device)?,
            vocab,
            blank_id,
        };

        info!(vocab = transcriber.vocab.len(), "Parakeet model loaded successfully");
        Ok(transcriber)
    }

    /// Mel features for the waveform: `[1, mels, frames]` and its valid length.
    fn preprocess(&mut self, audio: Vec<f32>) -> Result<(Array3<f32>, i64)> {
        let len = audio.len();
        let waveforms = Array2::from_shape_vec((1, len), audio).context("Bad waveform shape")?;
        let waveforms_lens = Array1::from_vec(vec![len as i64]);

        let outputs = self
            .preprocessor
            .run(ort::inputs![
                "waveforms" => TensorRef::from_array_view(&waveforms)?,
                "waveforms_lens" => TensorRef::from_array_view(&waveforms_lens)?
            ])
            .context("Preprocessor inference failed")?;

        let (shape, data) = outputs["features"]
            .try_extract_tensor::<f32>()
            .context("Failed to extract features")?;
        let features = to_array3(shape, data)?;
        let (_, lens) = outputs["features_lens"]
            .try_extract_tensor::<i64>()
            .context("Failed to extract feature lengths")?;

        Ok((features, lens.first().copied().unwrap_or(0)))
    }

    /// Encoder frames, one `Vec` of hidden size per time step.
    fn encode(&mut self, features: &Array3<f32>, len: i64) -> Result<Vec<Vec<f32>>> {
        let length = Array1::from_vec(vec![len]);
        let outputs = self
            .encoder
            .run(ort::inputs![
                "audio_signal" => TensorRef::from_array_view(features)?,
                "length" => TensorRef::from_array_view(&length)?
            ])
            .context("Encoder inference failed")?;

        let (shape, data) = outputs["outputs"]
            .try_extract_tensor::<f32>()
            .context("Failed to extract encoder output")?;
        // [batch, hidden, time]
        let encoded = to_array3(shape, data)?;
        let (_, encoded_lens) = outputs["encoded_lengths"]
            .try_extract_tensor::<i64>()
            .context("Failed to extract encoded lengths")?;

        let frames = encoded_lens
            .first()
            .map_or(0, |&n| n.max(0) as usize)
            .min(encoded.shape()[2]);
        Ok((0..frames)
            .map(|t| encoded.slice(ndarray::s![0, .., t]).to_vec())
            .collect())
    }

    fn decode(&mut self, frames: &[Vec<f32>]) -> Result<Vec<usize>> {
        let state_shape = (DECODER_LAYERS, 1, DECODER_HIDDEN);
        let mut state1 = Array3::<f32>::zeros(state_shape);
        let mut state2 = Array3::<f32>::zeros(state_shape);
        let target_length = Array1::from_vec(vec![1i32]);

        let mut tokens = Vec::new();
        let mut last_token = self.blank_id;
        let mut emitted = 0;
        let mut t = 0;

        while t < frames.len() {
            let frame = &frames[t];
            let step = Array3::from_shape_vec((1, frame.len(), 1), frame.clone())
                .context("Bad encoder frame shape")?;
            let targets = Array2::from_elem((1, 1), last_token as i32);

            let outputs = self
                .decoder_joint
                .run(ort::inputs![
                    "encoder_outputs" => TensorRef::from_array_view(&step)?,
                    "targets" => TensorRef::from_array_view(&targets)?,
                    "target_length" => TensorRef::from_array_view(&target_length)?,
                    "input_states_1" => TensorRef::from_array_view(&state1)?,
                    "input_states_2" => TensorRef::from_array_view(&state2)?
                ])
                .context("Decoder inference failed")?;

            let (_, logits) = outputs["outputs"]
                .try_extract_tensor::<f32>()
                .context("Failed to extract joint logits")?;
            let (token, skip) = greedy_step(logits, self.vocab.len());

            if token != self.blank_id {
                let (_, s1) = outputs["output_states_1"]
                    .try_extract_tensor::<f32>()
                    .context("Failed to extract decoder state")?;
                let (_, s2) = outputs["output_states_2"]
                    .try_extract_tensor::<f32>()
                    .context("Failed to extract decoder state")?;
                state1 = Array3::from_shape_vec(state_shape, s1.to_vec())?;
                state2 = Array3::from_shape_vec(state_shape, s2.to_vec())?;
                tokens.push(token);
                last_token = token;
                emitted += 1;
            }

            if skip > 0 {
                t += skip;
                emitted = 0;
            } else if token == self.blank_id || emitted >= MAX_TOKENS_PER_STEP {
                t += 1;
                emitted = 0;
            }
        }

        Ok(tokens)
    }
}

impl Transcriber for ParakeetTranscriber {
    fn transcribe(&mut self, wav: &Path, language: &str) -> Result<Vec<String>> {
        let (audio, sample_rate) = read_wav(wav)?;
        if sample_rate != TARGET_SAMPLE_RATE {
            anyhow::bail!("Parakeet expects 16kHz audio, got {}Hz", sample_rate);
        }
        if audio.is_empty() {
            return Ok(Vec::new());
        }

        // The multilingual model detects the language itself.
        debug!(
            samples = audio.len(),
            language = language,
            "Transcribing audio with Parakeet"
        );

        let (features, len) = self.preprocess(audio)?;
        let frames = self.encode(&features, len)?;
        let tokens = self.decode(&frames)?;
        let text = detokenize(&self.vocab, &tokens);

        debug!(frames = frames.len(), tokens = tokens.len(), "Transcription complete");
        Ok(vec![text])
    }
}

fn open_session(path: &Path, device: ComputeDevice) -> Result<Session> {
    let builder = Session::builder().context("Failed to create ONNX session builder")?;
    let builder = match device {
        ComputeDevice::Accelerated => builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .build()
                .error_on_failure()])
            .context("CUDA execution provider unavailable")?,
        ComputeDevice::Cpu => builder
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to register CPU execution provider")?,
    };
    builder
        .commit_from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn to_array3(shape: &[i64], data: &[f32]) -> Result<Array3<f32>> {
    let [a, b, c] = shape else {
        anyhow::bail!("Expected a rank-3 tensor, got shape {:?}", shape);
    };
    Array3::from_shape_vec((*a as usize, *b as usize, *c as usize), data.to_vec())
        .context("Tensor data does not match its shape")
}

/// Parse `vocab.txt` (`<token> <id>` per line). Returns the table and the blank id.
fn parse_vocab(content: &str) -> Result<(Vec<String>, usize)> {
    let entries: Vec<(String, usize)> = content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let token = parts.next()?.to_string();
            let id = parts.next()?.parse().ok()?;
            Some((token, id))
        })
        .collect();

    let size = entries.iter().map(|(_, id)| id + 1).max().unwrap_or(0);
    let mut vocab = vec![String::new(); size];
    let mut blank_id = None;
    for (token, id) in entries {
        if token == "<blk>" {
            blank_id = Some(id);
        }
        vocab[id] = token;
    }

    // Exports without an explicit blank put it right after the vocabulary.
    Ok((vocab, blank_id.unwrap_or(size)))
}

/// Best token and frame advance from one joint output.
///
/// The first `vocab_size` logits score tokens (blank included); the rest score
/// durations 0, 1, 2, ...
fn greedy_step(logits: &[f32], vocab_size: usize) -> (usize, usize) {
    let split = vocab_size.min(logits.len());
    let (token_logits, duration_logits) = logits.split_at(split);
    (argmax(token_logits), argmax(duration_logits))
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}

fn detokenize(vocab: &[String], tokens: &[usize]) -> String {
    let joined: String = tokens
        .iter()
        .filter_map(|&id| vocab.get(id))
        .filter(|token| !(token.starts_with('<') && token.ends_with('>')))
        .map(|token| token.replace(WORD_BOUNDARY, " "))
        .collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_parse_vocab() {
        let (vocab, blank) = parse_vocab("<unk> 0\n\u{2581}bon 1\njour 2\n<blk> 3\n").unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab[1], "\u{2581}bon");
        assert_eq!(blank, 3);
    }

    #[test]
    fn test_parse_vocab_implicit_blank() {
        let (vocab, blank) = parse_vocab("a 0\nb 1\n").unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(blank, 2);
    }

    #[test]
    fn test_greedy_step_splits_durations() {
        // 3 tokens (blank last) followed by 5 durations.
        let logits = [0.1, 0.9, 0.2, 0.0, 0.0, 0.7, 0.1, 0.0];
        assert_eq!(greedy_step(&logits, 3), (1, 2));
    }

    #[test]
    fn test_greedy_step_without_durations() {
        assert_eq!(greedy_step(&[0.1, 0.2, 0.9], 3), (2, 0));
    }

    #[test]
    fn test_detokenize_word_boundaries() {
        let vocab = vocab(&[
            "<unk>",
            "\u{2581}bon",
            "jour",
            "\u{2581}le",
            "\u{2581}monde",
            "<blk>",
        ]);
        assert_eq!(detokenize(&vocab, &[1, 2, 3, 4]), "bonjour le monde");
        assert_eq!(detokenize(&vocab, &[0, 5]), "");
    }

    #[test]
    fn test_to_array3_rejects_other_ranks() {
        assert!(to_array3(&[2, 2], &[0.0; 4]).is_err());
        assert_eq!(to_array3(&[1, 2, 2], &[0.0; 4]).unwrap().shape(), &[1, 2, 2]);
    }

    #[test]
    fn test_unknown_model_name_fails_to_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let backend = ParakeetBackend::new(
            "nvidia/parakeet-rnnt-1.1b",
            ModelManager::with_dir(temp.path()),
        );
        assert_eq!(backend.engine_type(), EngineType::Parakeet);
        assert!(backend.load(ComputeDevice::Cpu).is_err());
    }
}
