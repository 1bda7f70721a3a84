//! Bounded invocation of external helper tools.
//!
//! Every helper (clipboard tools, keystroke simulators, liveness probes) is
//! reached through [`CommandRunner`], so a hung tool costs at most its timeout
//! and tests can script tool outcomes without spawning anything.

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between exit polls while waiting on a helper.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long stdout may keep streaming after the child exited.
const STDOUT_GRACE: Duration = Duration::from_millis(200);

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Text written to the child's stdin, which is closed afterwards.
    pub stdin: Option<String>,
    /// Collect stdout. Off by default: forking tools keep an inherited pipe open.
    pub capture_stdout: bool,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            capture_stdout: false,
            timeout,
        }
    }

    /// Feed `input` to the child's stdin.
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Collect what the child prints.
    pub fn capturing_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// Render as a shell-like line for logs.
    ///
    /// Operands after a `--` separator carry user text and are replaced by their count.
    pub fn display_redacted(&self) -> String {
        let options = self
            .args
            .iter()
            .position(|arg| arg == "--")
            .map_or(self.args.len(), |separator| separator + 1);
        let mut line = std::iter::once(self.program.as_str())
            .chain(self.args[..options].iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let hidden = self.args.len() - options;
        if hidden > 0 {
            line.push_str(&format!(" <{hidden} redacted>"));
        }
        line
    }
}

/// Outcome of a helper that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// True when the process exited with status 0.
    pub success: bool,
    pub stdout: String,
}

/// Runs external commands.
///
/// `Err` means the command could not run at all (missing binary, timeout);
/// a non-zero exit is reported as `Ok` with `success == false`.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run and collapse every failure mode into `false`.
    fn succeeds(&self, invocation: &Invocation) -> bool {
        match self.run(invocation) {
            Ok(output) => output.success,
            Err(e) => {
                debug!(command = %invocation.program, error = %e, "Helper command failed");
                false
            }
        }
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if invocation.capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", invocation.program))?;

        // Drain stdout on a side thread so a chatty child never blocks on a full pipe.
        let (stdout_tx, stdout_rx) = mpsc::channel();
        if let Some(mut stdout) = child.stdout.take() {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stdout.read_to_end(&mut buf);
                let _ = stdout_tx.send(String::from_utf8_lossy(&buf).into_owned());
            });
        }

        if let (Some(input), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
            // A tool that exits without reading its input is judged by its status.
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                debug!(command = %invocation.program, error = %e, "Failed to write stdin");
            }
        }

        let deadline = Instant::now() + invocation.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().context("Failed to poll child")? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!(
                    command = %invocation.display_redacted(),
                    timeout_ms = invocation.timeout.as_millis() as u64,
                    "Helper command timed out, killing"
                );
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("{} timed out", invocation.program);
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        // A forked grandchild may still hold the pipe; never wait on it for long.
        let stdout = stdout_rx.recv_timeout(STDOUT_GRACE).unwrap_or_default();

        Ok(CommandOutput {
            success: status.success(),
            stdout,
        })
    }
}

#[cfg(test)]
#[path = "process_test.rs"]
mod tests;
