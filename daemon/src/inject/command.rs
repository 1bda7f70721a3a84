//! Typing through a keystroke simulator.

use super::{BackendKind, InjectionBackend};
use crate::environment::EnvironmentProbe;
use crate::process::{CommandRunner, Invocation};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Long dictations are typed one key at a time, so the bound is generous.
const TYPE_TIMEOUT: Duration = Duration::from_secs(30);

const DAEMON_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Keystroke simulator driven by [`CommandBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingTool {
    Xdotool,
    /// Needs the `ydotoold` daemon to be running.
    Ydotool,
}

impl TypingTool {
    fn program(&self) -> &'static str {
        match self {
            TypingTool::Xdotool => "xdotool",
            TypingTool::Ydotool => "ydotool",
        }
    }
}

/// Types text by running `xdotool type` or `ydotool type`.
pub struct CommandBackend {
    tool: TypingTool,
    program: Option<PathBuf>,
    pgrep: Option<PathBuf>,
    key_delay_ms: u32,
    runner: Arc<dyn CommandRunner>,
}

impl CommandBackend {
    pub fn new(tool: TypingTool, probe: &EnvironmentProbe, key_delay_ms: u32) -> Self {
        Self {
            tool,
            program: probe.find_executable(tool.program()),
            pgrep: probe.find_executable("pgrep"),
            key_delay_ms,
            runner: probe.runner(),
        }
    }

    pub fn tool(&self) -> TypingTool {
        self.tool
    }

    fn daemon_running(&self) -> bool {
        let Some(pgrep) = &self.pgrep else {
            debug!("pgrep not found, cannot check for ydotoold");
            return false;
        };
        let invocation = Invocation::new(
            pgrep.to_string_lossy(),
            ["-x", "ydotoold"],
            DAEMON_CHECK_TIMEOUT,
        );
        self.runner.succeeds(&invocation)
    }

    fn type_invocation(&self, program: &str, text: &str) -> Invocation {
        let delay = self.key_delay_ms.to_string();
        let args = match self.tool {
            TypingTool::Xdotool => vec![
                "type",
                "--clearmodifiers",
                "--delay",
                delay.as_str(),
                "--",
                text,
            ],
            TypingTool::Ydotool => vec!["type", "--key-delay", delay.as_str(), "--", text],
        };
        Invocation::new(program, args, TYPE_TIMEOUT)
    }
}

impl InjectionBackend for CommandBackend {
    fn kind(&self) -> BackendKind {
        match self.tool {
            TypingTool::Xdotool => BackendKind::Xdotool,
            TypingTool::Ydotool => BackendKind::Ydotool,
        }
    }

    fn is_available(&self) -> bool {
        match self.tool {
            TypingTool::Xdotool => self.program.is_some(),
            TypingTool::Ydotool => self.program.is_some() && self.daemon_running(),
        }
    }

    fn inject_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }

        let Some(program) = &self.program else {
            warn!(tool = self.tool.program(), "Typing tool is not installed");
            return false;
        };
        if self.tool == TypingTool::Ydotool && !self.daemon_running() {
            warn!("ydotoold is not running");
            return false;
        }

        let invocation = self.type_invocation(&program.to_string_lossy(), text);
        match self.runner.run(&invocation) {
            Ok(output) if output.success => true,
            Ok(_) => {
                warn!(tool = self.tool.program(), "Typing tool exited with an error");
                false
            }
            Err(e) => {
                warn!(tool = self.tool.program(), error = %e, "Typing tool failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "command_test.rs"]
mod tests;
