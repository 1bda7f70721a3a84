//! Control thread owning the dictation manager.
//!
//! Signal handlers and UIs never touch the engine directly: they send
//! [`ControlCommand`]s to a dedicated thread, which runs them one at a time,
//! and observe the outcome through [`DictationEvent`]s.

use crate::dictation::DictationManager;
use crate::engine::{DictationState, EngineCallbacks};
use anyhow::{Context, Result};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Request for the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Toggle,
    Start,
    Stop,
    Preload,
    /// Stop any active recording and exit the control thread.
    Shutdown,
}

/// Notification published by the control thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    StateChanged(DictationState),
    /// Text recognized and handed to the injector.
    TextObserved(String),
}

pub type EventSender = broadcast::Sender<DictationEvent>;

/// Engine callbacks republishing on `events` and `state`.
pub fn event_callbacks(
    events: &EventSender,
    state: watch::Sender<DictationState>,
) -> EngineCallbacks {
    let state_events = events.clone();
    let text_events = events.clone();
    EngineCallbacks {
        on_state_change: Some(Box::new(move |new_state: DictationState| {
            state.send_replace(new_state);
            // No subscribers is fine.
            let _ = state_events.send(DictationEvent::StateChanged(new_state));
        })),
        on_text: Some(Box::new(move |text: &str| {
            let _ = text_events.send(DictationEvent::TextObserved(text.to_string()));
        })),
    }
}

/// Cloneable sender of control commands.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    /// Queue a command. Returns false once the control thread has exited.
    pub fn send(&self, command: ControlCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// The running control thread.
pub struct Controller {
    handle: ControlHandle,
    events: EventSender,
    state: watch::Receiver<DictationState>,
    thread: JoinHandle<()>,
}

impl Controller {
    /// Build the manager through `build` and move it onto a control thread.
    ///
    /// `build` receives callbacks wired to the controller's events.
    pub fn spawn<F>(events: EventSender, build: F) -> Result<Self>
    where
        F: FnOnce(EngineCallbacks) -> Result<DictationManager>,
    {
        let (state_tx, state_rx) = watch::channel(DictationState::Idle);
        let manager = build(event_callbacks(&events, state_tx))?;
        let (commands_tx, commands_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("linvoc-control".to_string())
            .spawn(move || control_loop(manager, commands_rx))
            .context("Failed to spawn control thread")?;

        Ok(Self {
            handle: ControlHandle {
                commands: commands_tx,
            },
            events,
            state: state_rx,
            thread,
        })
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    pub fn send(&self, command: ControlCommand) -> bool {
        self.handle.send(command)
    }

    /// Last state reported by the engine.
    pub fn state(&self) -> DictationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DictationEvent> {
        self.events.subscribe()
    }

    /// Ask the thread to shut down and wait for it.
    ///
    /// Blocks while an active recording is transcribed.
    pub fn shutdown(self) {
        self.handle.send(ControlCommand::Shutdown);
        if self.thread.join().is_err() {
            warn!("Control thread panicked");
        }
    }
}

fn control_loop(mut manager: DictationManager, commands: mpsc::Receiver<ControlCommand>) {
    info!(engine = %manager.engine_type_name(), "Control thread started");

    while let Ok(command) = commands.recv() {
        debug!(command = ?command, state = %manager.state(), "Control command");
        match command {
            ControlCommand::Toggle => {
                manager.toggle();
            }
            ControlCommand::Start => {
                if !manager.start() {
                    warn!(state = %manager.state(), "Dictation did not start");
                }
            }
            ControlCommand::Stop => {
                manager.stop();
            }
            ControlCommand::Preload => {
                if !manager.preload() {
                    warn!(model = %manager.model_name(), "Model preload failed");
                }
            }
            ControlCommand::Shutdown => break,
        }
    }

    if manager.is_recording() {
        info!("Stopping active recording before exit");
        manager.stop();
    }
    info!("Control thread stopped");
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
