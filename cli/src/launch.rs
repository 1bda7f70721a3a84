//! Single-instance decisions taken before launching.

use linvoc_common::instance::{InstanceLock, send_toggle_signal};

/// Result of asking the instance holding a scope to toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    NotRunning,
    Sent(u32),
    /// The instance exists but could not be signalled.
    Failed(u32),
}

impl ToggleOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ToggleOutcome::Sent(_))
    }
}

/// Signal the live instance of `scope`, if there is one.
pub fn toggle_running(lock: &InstanceLock, scope: &str) -> ToggleOutcome {
    match lock.get_running_pid(scope) {
        None => ToggleOutcome::NotRunning,
        Some(pid) if send_toggle_signal(pid) => ToggleOutcome::Sent(pid),
        Some(pid) => ToggleOutcome::Failed(pid),
    }
}

/// What a launch should do given the instances already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDecision {
    /// No usable instance: start a new one.
    Start,
    /// A daemon already holds the scope; leave it alone.
    AlreadyRunning(u32),
    /// The running instance was asked to toggle instead.
    Toggled(u32),
}

/// Daemons never signal their peer; regular launches toggle it and only start
/// a new instance when that fails.
pub fn decide(lock: &InstanceLock, scope: &str, daemon: bool) -> LaunchDecision {
    if daemon {
        return match lock.get_running_pid(scope) {
            Some(pid) => LaunchDecision::AlreadyRunning(pid),
            None => LaunchDecision::Start,
        };
    }
    match toggle_running(lock, scope) {
        ToggleOutcome::Sent(pid) => LaunchDecision::Toggled(pid),
        ToggleOutcome::NotRunning | ToggleOutcome::Failed(_) => LaunchDecision::Start,
    }
}
