//! Shared fixtures: scripted helper tools, fake executables on a fake PATH,
//! and stand-ins for the microphone, speech models and injection.

use crate::audio::{AudioSource, AudioStream, FRAME_SAMPLES, read_wav};
use crate::engine::EngineType;
use crate::environment::EnvironmentProbe;
use crate::inject::{BackendKind, InjectionBackend, InjectorSettings, TextInjector};
use crate::process::{CommandOutput, CommandRunner, Invocation};
use crate::transcribe::{ComputeDevice, ModelBackend, Transcriber};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// What a scripted tool does when invoked.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Exit 0, printing the given text.
    Succeed(String),
    /// Exit non-zero.
    Fail,
    /// Could not run (missing binary, timeout).
    Error,
}

/// Command runner answering from a script keyed by program name.
pub struct FakeRunner {
    outcomes: Mutex<HashMap<String, Outcome>>,
    default: Outcome,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    /// Every unscripted tool succeeds with empty output.
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::with_default(Outcome::Succeed(String::new())))
    }

    /// Every unscripted tool exits non-zero.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_default(Outcome::Fail))
    }

    fn with_default(default: Outcome) -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the outcome for `program` (matched on its file name).
    pub fn respond(&self, program: &str, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(program.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// File names of the invoked programs, in call order.
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| program_name(&call.program))
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let name = program_name(&invocation.program);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        match outcome {
            Outcome::Succeed(stdout) => Ok(CommandOutput {
                success: true,
                stdout,
            }),
            Outcome::Fail => Ok(CommandOutput {
                success: false,
                stdout: String::new(),
            }),
            Outcome::Error => anyhow::bail!("{name} could not run"),
        }
    }
}

fn program_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

/// Directory holding executable stubs for each of `tools`.
pub fn fake_path(tools: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for tool in tools {
        install_script(dir.path(), tool, "#!/bin/sh\nexit 0\n");
    }
    dir
}

/// Write an executable shell script named `name` into `dir`.
pub fn install_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Probe over a synthetic session.
pub fn probe(
    vars: &[(&str, &str)],
    path: &TempDir,
    runner: Arc<FakeRunner>,
) -> EnvironmentProbe {
    let vars = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvironmentProbe::new(vars, vec![path.path().to_path_buf()], runner)
}

/// Injection backend remembering what it was asked to type.
#[derive(Default)]
pub struct RecordingBackend {
    texts: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

impl InjectionBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Xdotool
    }

    fn is_available(&self) -> bool {
        true
    }

    fn inject_text(&self, text: &str) -> bool {
        self.texts.lock().unwrap().push(text.to_string());
        true
    }
}

/// Injector bound to a [`RecordingBackend`].
pub fn recording_injector() -> (Arc<TextInjector>, Arc<RecordingBackend>) {
    let probe = EnvironmentProbe::new(HashMap::new(), Vec::new(), FakeRunner::failing());
    let injector = TextInjector::new(Arc::new(probe), InjectorSettings::default());
    let backend = Arc::new(RecordingBackend::default());
    injector.install(backend.clone());
    (Arc::new(injector), backend)
}

/// Microphone stand-in producing silent frames.
pub struct FakeAudioSource {
    /// Number of upcoming opens that fail.
    failing_opens: AtomicUsize,
    /// Every n-th read fails; 0 disables failures.
    fail_every: usize,
}

impl FakeAudioSource {
    fn build(failing_opens: usize, fail_every: usize) -> Arc<Self> {
        Arc::new(Self {
            failing_opens: AtomicUsize::new(failing_opens),
            fail_every,
        })
    }

    pub fn working() -> Arc<Self> {
        Self::build(0, 0)
    }

    pub fn broken() -> Arc<Self> {
        Self::build(usize::MAX, 0)
    }

    pub fn failing_once() -> Arc<Self> {
        Self::build(1, 0)
    }

    pub fn flaky(fail_every: usize) -> Arc<Self> {
        Self::build(0, fail_every)
    }
}

impl AudioSource for FakeAudioSource {
    fn open(&self) -> anyhow::Result<Box<dyn AudioStream>> {
        let failing = self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("no input device");
        }
        Ok(Box::new(FakeStream {
            reads: 0,
            fail_every: self.fail_every,
        }))
    }
}

struct FakeStream {
    reads: usize,
    fail_every: usize,
}

impl AudioStream for FakeStream {
    fn read_frame(&mut self, _timeout: Duration) -> anyhow::Result<Option<Vec<i16>>> {
        self.reads += 1;
        std::thread::sleep(Duration::from_millis(2));
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            anyhow::bail!("buffer overflow");
        }
        Ok(Some(vec![0; FRAME_SAMPLES]))
    }
}

/// What a [`FakeModel`] does.
#[derive(Debug, Clone, Default)]
pub struct ModelScript {
    /// Loading on the accelerated device fails.
    pub no_accelerator: bool,
    /// Loading fails on every device.
    pub broken: bool,
    /// Runtime missing from the build.
    pub unavailable: bool,
    /// Segments returned by transcription; `None` makes transcription fail.
    pub segments: Option<Vec<String>>,
}

/// Observations shared between a [`FakeModel`] and the test.
#[derive(Debug, Default)]
pub struct ModelLog {
    pub loads: Mutex<Vec<ComputeDevice>>,
    /// Sample count of every transcribed WAV file.
    pub transcribed_samples: Mutex<Vec<usize>>,
    pub languages: Mutex<Vec<String>>,
}

pub struct FakeModel {
    pub script: ModelScript,
    pub log: Arc<ModelLog>,
}

impl FakeModel {
    pub fn new(script: ModelScript) -> (Box<Self>, Arc<ModelLog>) {
        let log = Arc::new(ModelLog::default());
        let model = Box::new(Self {
            script,
            log: Arc::clone(&log),
        });
        (model, log)
    }
}

impl ModelBackend for FakeModel {
    fn engine_type(&self) -> EngineType {
        EngineType::Whisper
    }

    fn model_name(&self) -> String {
        "fake-base".to_string()
    }

    fn is_available(&self) -> bool {
        !self.script.unavailable
    }

    fn load(&self, device: ComputeDevice) -> anyhow::Result<Box<dyn Transcriber>> {
        self.log.loads.lock().unwrap().push(device);
        if self.script.broken {
            anyhow::bail!("model file corrupted");
        }
        if self.script.no_accelerator && device == ComputeDevice::Accelerated {
            anyhow::bail!("no CUDA device");
        }
        Ok(Box::new(FakeTranscriber {
            segments: self.script.segments.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeTranscriber {
    segments: Option<Vec<String>>,
    log: Arc<ModelLog>,
}

impl Transcriber for FakeTranscriber {
    fn transcribe(&mut self, wav: &Path, language: &str) -> anyhow::Result<Vec<String>> {
        let (samples, _) = read_wav(wav)?;
        self.log.transcribed_samples.lock().unwrap().push(samples.len());
        self.log.languages.lock().unwrap().push(language.to_string());
        self.segments
            .clone()
            .ok_or_else(|| anyhow::anyhow!("inference failed"))
    }
}
