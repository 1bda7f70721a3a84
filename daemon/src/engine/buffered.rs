//! Record-then-transcribe dictation with an in-process model.
//!
//! A capture thread owns the audio buffer while recording and hands it back
//! when told to stop; transcription then runs on the caller's thread.

use super::{DictationState, EngineCallbacks, EngineType, StateCell, TextCallback};
use crate::audio::{AudioBuffer, AudioSource, AudioStream, TARGET_SAMPLE_RATE, write_wav};
use crate::inject::TextInjector;
use crate::transcribe::{ComputeDevice, ModelBackend, Transcriber, join_segments};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long stop() waits for the capture thread to hand over the buffer.
const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// How long start() waits for the microphone to open.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval of the capture loop for the stop flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Back-off after a failed read.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(20);

/// A running capture thread.
struct CaptureSession {
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<AudioBuffer>,
    handle: JoinHandle<()>,
}

impl CaptureSession {
    fn spawn(source: Arc<dyn AudioSource>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (done_tx, done_rx) = mpsc::channel();

        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("linvoc-capture".to_string())
            .spawn(move || {
                // The stream is opened here: audio streams may not cross threads.
                let stream = match source.open() {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let buffer = capture_loop(stream, &thread_stop);
                let _ = done_tx.send(buffer);
            })
            .context("Failed to spawn capture thread")?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                stop,
                done: done_rx,
                handle,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.context("Failed to open microphone"))
            }
            Err(_) => {
                stop.store(true, Ordering::Release);
                anyhow::bail!("Microphone did not open within {:?}", OPEN_TIMEOUT)
            }
        }
    }

    /// Signal the thread and take over its buffer.
    fn finish(self, timeout: Duration) -> Option<AudioBuffer> {
        self.stop.store(true, Ordering::Release);
        match self.done.recv_timeout(timeout) {
            Ok(buffer) => {
                if self.handle.join().is_err() {
                    warn!("Capture thread panicked");
                }
                Some(buffer)
            }
            Err(_) => {
                warn!(timeout = ?timeout, "Capture thread did not finish, dropping audio");
                None
            }
        }
    }
}

fn capture_loop(mut stream: Box<dyn AudioStream>, stop: &AtomicBool) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(TARGET_SAMPLE_RATE);
    let mut read_errors = 0usize;

    while !stop.load(Ordering::Acquire) {
        match stream.read_frame(READ_TIMEOUT) {
            Ok(Some(frame)) => buffer.push_frame(&frame),
            Ok(None) => {}
            Err(e) => {
                // A bad read costs one frame, never the recording.
                if read_errors == 0 {
                    warn!(error = %e, "Audio read failed, continuing");
                }
                read_errors += 1;
                std::thread::sleep(READ_ERROR_BACKOFF);
            }
        }
    }

    debug!(
        duration_secs = buffer.duration_secs(),
        read_errors = read_errors,
        "Capture finished"
    );
    buffer
}

/// Dictation engine running a speech model in-process.
pub struct BufferedEngine {
    language: String,
    backend: Box<dyn ModelBackend>,
    source: Arc<dyn AudioSource>,
    injector: Arc<TextInjector>,
    state: StateCell,
    on_text: Option<TextCallback>,
    transcriber: Option<Box<dyn Transcriber>>,
    device: Option<ComputeDevice>,
    capture: Option<CaptureSession>,
    join_timeout: Duration,
}

impl BufferedEngine {
    pub fn new(
        language: impl Into<String>,
        backend: Box<dyn ModelBackend>,
        source: Arc<dyn AudioSource>,
        injector: Arc<TextInjector>,
        callbacks: EngineCallbacks,
    ) -> Self {
        Self {
            language: language.into(),
            backend,
            source,
            injector,
            state: StateCell::new(callbacks.on_state_change),
            on_text: callbacks.on_text,
            transcriber: None,
            device: None,
            capture: None,
            join_timeout: CAPTURE_JOIN_TIMEOUT,
        }
    }

    pub fn state(&self) -> DictationState {
        self.state.get()
    }

    pub fn engine_type(&self) -> EngineType {
        self.backend.engine_type()
    }

    pub fn model_name(&self) -> String {
        self.backend.model_name()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn compute_device(&self) -> Option<ComputeDevice> {
        self.device
    }

    /// Load the model now instead of on the first `start()`.
    pub fn preload(&mut self) -> bool {
        self.is_available() && self.ensure_model()
    }

    /// Load the model, preferring the accelerated device.
    fn ensure_model(&mut self) -> bool {
        if self.transcriber.is_some() {
            return true;
        }

        for device in [ComputeDevice::Accelerated, ComputeDevice::Cpu] {
            match self.backend.load(device) {
                Ok(transcriber) => {
                    info!(
                        model = %self.backend.model_name(),
                        device = %device,
                        "Speech model ready"
                    );
                    self.transcriber = Some(transcriber);
                    self.device = Some(device);
                    return true;
                }
                Err(e) => {
                    warn!(
                        device = %device,
                        error = format!("{e:#}"),
                        "Failed to load speech model"
                    );
                }
            }
        }

        error!(model = %self.backend.model_name(), "Speech model could not be loaded");
        false
    }

    pub fn start(&mut self) -> bool {
        if self.state.is(DictationState::Recording) {
            return false;
        }

        if !self.is_available() {
            error!(
                engine = self.engine_type().as_str(),
                "Speech runtime not compiled into this build"
            );
            self.state.set(DictationState::Error);
            return false;
        }

        if !self.ensure_model() {
            self.state.set(DictationState::Error);
            return false;
        }

        match CaptureSession::spawn(Arc::clone(&self.source)) {
            Ok(capture) => {
                self.capture = Some(capture);
                self.state.set(DictationState::Recording);
                true
            }
            Err(e) => {
                error!(error = format!("{e:#}"), "Failed to start recording");
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
        let buffer = self
            .capture
            .take()
            .and_then(|capture| capture.finish(self.join_timeout));

        if let Some(buffer) = buffer.filter(|buffer| !buffer.is_empty()) {
            self.deliver(&buffer);
        }

        self.state.set(DictationState::Idle);
        String::new()
    }

    fn deliver(&mut self, buffer: &AudioBuffer) {
        let text = match self.transcribe(buffer) {
            Ok(text) => text,
            Err(e) => {
                error!(error = format!("{e:#}"), "Transcription failed");
                return;
            }
        };
        if text.is_empty() {
            debug!("No speech recognized");
            return;
        }

        if !self.injector.inject(&format!("{text} ")) {
            warn!("Recognized text could not be injected");
        }
        if let Some(on_text) = &self.on_text {
            on_text(&text);
        }
    }

    fn transcribe(&mut self, buffer: &AudioBuffer) -> Result<String> {
        let transcriber = self
            .transcriber
            .as_mut()
            .context("Speech model not loaded")?;

        let wav = tempfile::Builder::new()
            .prefix("linvoc-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create temporary WAV file")?;
        write_wav(wav.path(), buffer)?;

        debug!(duration_secs = buffer.duration_secs(), "Transcribing recording");
        let segments = transcriber.transcribe(wav.path(), &self.language)?;
        Ok(join_segments(segments))
    }
}

impl Drop for BufferedEngine {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.stop.store(true, Ordering::Release);
        }
    }
}
