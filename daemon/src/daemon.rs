//! Long-running instance: lock record, signal handling and the control thread.

use std::sync::Arc;

use anyhow::{Context, Result};
use linvoc_common::instance::InstanceLock;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::controller::{ControlCommand, ControlHandle, Controller, EventSender};
use crate::dictation::{DictationContext, DictationManager, EngineSelection};
use crate::environment::EnvironmentProbe;
use crate::inject::{InjectorSettings, SelectionError, TextInjector};

/// Everything a running instance is configured with.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub selection: EngineSelection,
    pub injection: InjectorSettings,
    /// Lock scope this instance registers under.
    pub scope: String,
    pub lock: InstanceLock,
    /// Begin recording as soon as the engine is up.
    pub start_immediately: bool,
    /// Load the speech model before the first toggle.
    pub preload: bool,
}

/// Run an instance for the live desktop session until SIGINT or SIGTERM.
pub async fn run(options: DaemonOptions) -> Result<()> {
    let probe = Arc::new(EnvironmentProbe::from_env());
    let injector = Arc::new(TextInjector::new(
        Arc::clone(&probe),
        options.injection.clone(),
    ));
    let (events, _) = broadcast::channel(64);
    run_with_context(options, DictationContext::new(probe, injector), events).await
}

/// Run an instance over explicit collaborators, publishing on `events`.
pub async fn run_with_context(
    options: DaemonOptions,
    context: DictationContext,
    events: EventSender,
) -> Result<()> {
    select_injector(&context.injector, &options.injection)?;

    // Handlers go in before the lock record is visible: SIGUSR1 would
    // otherwise terminate us.
    let signals = Signals::install()?;
    options.lock.create_lock(&options.scope)?;

    let result = serve(&options, &context, events, signals).await;

    context.injector.shutdown();
    if let Err(e) = options.lock.remove_lock(&options.scope) {
        warn!(error = format!("{e:#}"), "Failed to remove lock file");
    }
    info!("linvoc stopped");
    result
}

fn select_injector(injector: &TextInjector, settings: &InjectorSettings) -> Result<()> {
    let forced = settings.forced_backend.as_deref();
    match injector.create(forced) {
        Ok(_) => Ok(()),
        Err(e) if forced.is_some() => Err(e).context("Configured injection backend is unusable"),
        Err(SelectionError::NoBackendAvailable) => {
            warn!("No text injection backend available, recognized text will be dropped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn serve(
    options: &DaemonOptions,
    context: &DictationContext,
    events: EventSender,
    signals: Signals,
) -> Result<()> {
    let selection = options.selection.clone();
    let controller = Controller::spawn(events, |callbacks| {
        DictationManager::new(selection, context, callbacks)
    })?;

    if options.preload {
        controller.send(ControlCommand::Preload);
    }
    if options.start_immediately {
        controller.send(ControlCommand::Start);
    }
    info!(
        pid = std::process::id(),
        scope = %options.scope,
        "linvoc ready, send SIGUSR1 to toggle dictation"
    );

    signals.forward(controller.handle()).await;

    // Joining may transcribe a final recording.
    tokio::task::spawn_blocking(move || controller.shutdown())
        .await
        .context("Control thread join failed")?;
    Ok(())
}

/// Signal streams an instance reacts to.
struct Signals {
    toggle: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    fn install() -> Result<Self> {
        Ok(Self {
            toggle: signal(SignalKind::user_defined1())
                .context("Failed to install SIGUSR1 handler")?,
            interrupt: signal(SignalKind::interrupt())
                .context("Failed to install SIGINT handler")?,
            terminate: signal(SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?,
        })
    }

    /// Turn SIGUSR1 into toggles until a termination signal arrives.
    async fn forward(mut self, control: ControlHandle) {
        loop {
            tokio::select! {
                _ = self.toggle.recv() => {
                    info!("Toggle requested");
                    if !control.send(ControlCommand::Toggle) {
                        error!("Control thread is gone");
                        return;
                    }
                }
                _ = self.interrupt.recv() => {
                    info!("SIGINT received, shutting down");
                    return;
                }
                _ = self.terminate.recv() => {
                    info!("SIGTERM received, shutting down");
                    return;
                }
            }
        }
    }
}
