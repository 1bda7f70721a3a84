//! Microphone capture and PCM handling for dictation.
//!
//! Recognizers consume 16 kHz mono 16-bit PCM. The microphone is captured at
//! its native format and converted on the fly; recordings are exchanged with
//! models as WAV files.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::SequentialSliceOfVecs;
use rubato::audioadapter::Adapter;
use rubato::{Fft, FixedSync, Resampler};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sample rate expected by every recognizer.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Samples per captured frame.
pub const FRAME_SAMPLES: usize = 1024;

/// Input chunk size used when the device rate differs from the target.
const RESAMPLER_CHUNK: usize = 1024;

/// Mono 16-bit PCM at a known sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    /// Append one captured frame.
    pub fn push_frame(&mut self, frame: &[i16]) {
        self.samples.extend_from_slice(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Convert multi-channel interleaved samples to mono by averaging all channels.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Streaming resampler; input of any length is buffered into fixed chunks.
pub struct AudioResampler {
    resampler: Fft<f32>,
    chunk_size: usize,
    pending: Vec<f32>,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32, chunk_size: usize) -> Result<Self> {
        let resampler = Fft::new(
            input_rate as usize,
            output_rate as usize,
            chunk_size,
            1, // sub_chunks
            1, // channels
            FixedSync::Input,
        )
        .context("Failed to create resampler")?;

        Ok(Self {
            resampler,
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
        })
    }

    /// Feed samples and return whatever complete chunks produced.
    pub fn push(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            let input_vecs = vec![chunk];
            let input_adapter = SequentialSliceOfVecs::new(&input_vecs, 1, self.chunk_size)
                .ok()
                .context("Invalid resampler input")?;
            let resampled = self
                .resampler
                .process(&input_adapter, 0, None)
                .context("Resampling failed")?;

            output.extend(
                (0..resampled.frames()).map(|frame| resampled.read_sample(0, frame).unwrap_or(0.0)),
            );
        }

        Ok(output)
    }

    /// Samples waiting for a full chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Something that can be recorded from.
pub trait AudioSource: Send + Sync {
    /// Open a stream. Called on the thread that reads from it.
    fn open(&self) -> Result<Box<dyn AudioStream>>;
}

/// An open recording stream.
pub trait AudioStream {
    /// Next frame of [`FRAME_SAMPLES`] mono samples at [`TARGET_SAMPLE_RATE`],
    /// or `None` if none became ready within `timeout`.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>>;
}

/// The default input device.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicrophoneSource;

impl AudioSource for MicrophoneSource {
    fn open(&self) -> Result<Box<dyn AudioStream>> {
        let capture = AudioCapture::start()?;
        let resampler = if capture.sample_rate() == TARGET_SAMPLE_RATE {
            None
        } else {
            debug!(
                from = capture.sample_rate(),
                to = TARGET_SAMPLE_RATE,
                "Resampling microphone input"
            );
            Some(AudioResampler::new(
                capture.sample_rate(),
                TARGET_SAMPLE_RATE,
                RESAMPLER_CHUNK,
            )?)
        };

        Ok(Box::new(MicrophoneStream {
            capture,
            resampler,
            ready: VecDeque::new(),
        }))
    }
}

struct MicrophoneStream {
    capture: AudioCapture,
    resampler: Option<AudioResampler>,
    ready: VecDeque<i16>,
}

impl AudioStream for MicrophoneStream {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>> {
        let deadline = Instant::now() + timeout;

        while self.ready.len() < FRAME_SAMPLES {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(samples) = self.capture.recv_timeout(remaining)? else {
                return Ok(None);
            };
            let samples = match &mut self.resampler {
                Some(resampler) => resampler.push(&samples)?,
                None => samples,
            };
            self.ready.extend(samples.into_iter().map(f32_to_i16));
        }

        Ok(Some(self.ready.drain(..FRAME_SAMPLES).collect()))
    }
}

/// Audio capture from the default input device.
///
/// The cpal stream is not `Send`; the capture lives on the thread that opened it.
pub struct AudioCapture {
    stream: cpal::Stream,
    receiver: mpsc::Receiver<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Start capturing audio from the default input device.
    pub fn start() -> Result<Self> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available")?;

        let config = device
            .default_input_config()
            .context("Failed to get default input config")?;

        let sample_rate = config.sample_rate();
        let channels = config.channels();

        let (sender, receiver) = mpsc::channel();
        let err_fn = |err| warn!(error = %err, "Audio stream error");

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    let _ = sender.send(data.to_vec());
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _| {
                    let _ = sender.send(data.iter().copied().map(i16_to_f32).collect());
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_input_stream(
                &config.into(),
                move |data: &[u16], _| {
                    let samples = data
                        .iter()
                        .map(|&s| (s as f32 - 32768.0) / 32768.0)
                        .collect();
                    let _ = sender.send(samples);
                },
                err_fn,
                None,
            ),
            format => anyhow::bail!("Unsupported sample format: {:?}", format),
        }
        .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;
        debug!(sample_rate, channels, "Microphone opened");

        Ok(Self {
            stream,
            receiver,
            sample_rate,
            channels,
        })
    }

    /// Native sample rate of the input device.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Wait for the next callback's samples, downmixed to mono.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<f32>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(samples) => Ok(Some(to_mono(&samples, self.channels))),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Audio stream closed")
            }
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        use cpal::traits::StreamTrait;
        let _ = self.stream.pause();
    }
}

/// Write mono 16-bit PCM as a WAV file.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Read a 16-bit PCM WAV file as mono f32 samples.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "Unsupported WAV format: {:?} {} bits",
            spec.sample_format,
            spec.bits_per_sample
        );
    }

    let samples = reader
        .samples::<i16>()
        .map(|sample| sample.map(i16_to_f32))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read WAV samples")?;

    Ok((to_mono(&samples, spec.channels), spec.sample_rate))
}

#[cfg(test)]
#[path = "audio_test.rs"]
mod tests;
