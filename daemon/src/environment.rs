//! Desktop environment detection: session type, desktop, and available tools.
//!
//! The probe works on a snapshot of the relevant environment variables and an
//! explicit executable search path, so the same code answers for the live
//! session and for synthetic sessions in tests.

use crate::inject::BackendKind;
use crate::process::{CommandRunner, Invocation, SystemRunner};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Environment variables the probe looks at.
const PROBED_VARS: [&str; 5] = [
    "XDG_SESSION_TYPE",
    "WAYLAND_DISPLAY",
    "DISPLAY",
    "XDG_CURRENT_DESKTOP",
    "DESKTOP_SESSION",
];

const PORTAL_BUS_NAME: &str = "org.freedesktop.portal.Desktop";
const PORTAL_OBJECT_PATH: &str = "/org/freedesktop/portal/desktop";

/// Upper bound for a D-Bus round trip to the portal.
const PORTAL_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Graphical session type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    X11,
    Wayland,
    Unknown,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::X11 => "x11",
            SessionType::Wayland => "wayland",
            SessionType::Unknown => "unknown",
        }
    }
}

/// Desktop environment, as far as the session advertises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopEnvironment {
    Gnome,
    Kde,
    Xfce,
    Cinnamon,
    Mate,
    Lxqt,
    Hyprland,
    Sway,
    Unknown,
}

impl DesktopEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesktopEnvironment::Gnome => "gnome",
            DesktopEnvironment::Kde => "kde",
            DesktopEnvironment::Xfce => "xfce",
            DesktopEnvironment::Cinnamon => "cinnamon",
            DesktopEnvironment::Mate => "mate",
            DesktopEnvironment::Lxqt => "lxqt",
            DesktopEnvironment::Hyprland => "hyprland",
            DesktopEnvironment::Sway => "sway",
            DesktopEnvironment::Unknown => "unknown",
        }
    }
}

/// Flat snapshot of everything the probe knows, for reports and UIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInfo {
    pub session_type: SessionType,
    pub desktop_environment: DesktopEnvironment,
    pub has_portal: bool,
    pub has_xdotool: bool,
    pub has_ydotool: bool,
    pub has_nerd_dictation: bool,
    pub has_whisper: bool,
    pub has_faster_whisper: bool,
    pub has_parakeet: bool,
    pub recommended_backend: Option<BackendKind>,
}

impl EnvironmentInfo {
    /// Key/value pairs in a stable order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("session_type", self.session_type.as_str().to_string()),
            (
                "desktop_environment",
                self.desktop_environment.as_str().to_string(),
            ),
            ("has_portal", self.has_portal.to_string()),
            ("has_xdotool", self.has_xdotool.to_string()),
            ("has_ydotool", self.has_ydotool.to_string()),
            ("has_nerd_dictation", self.has_nerd_dictation.to_string()),
            ("has_whisper", self.has_whisper.to_string()),
            ("has_faster_whisper", self.has_faster_whisper.to_string()),
            ("has_parakeet", self.has_parakeet.to_string()),
            (
                "recommended_backend",
                self.recommended_backend
                    .map_or("none", |kind| kind.as_str())
                    .to_string(),
            ),
        ]
    }
}

/// Inspects the graphical session and the tools installed on it.
pub struct EnvironmentProbe {
    vars: HashMap<String, String>,
    search_path: Vec<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl EnvironmentProbe {
    /// Probe the live session of this process.
    ///
    /// Executables are looked up on `PATH`, then next to the running binary.
    pub fn from_env() -> Self {
        let vars = PROBED_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();

        let mut search_path: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
        {
            search_path.push(exe_dir);
        }

        Self::new(vars, search_path, Arc::new(SystemRunner))
    }

    /// Probe a synthetic session.
    pub fn new(
        vars: HashMap<String, String>,
        search_path: Vec<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            vars,
            search_path,
            runner,
        }
    }

    /// Runner used for every helper tool in this session.
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    fn var(&self, name: &str) -> &str {
        self.vars.get(name).map(String::as_str).unwrap_or("")
    }

    /// Absolute path of an executable, if installed.
    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.search_path
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }

    pub fn session_type(&self) -> SessionType {
        match self.var("XDG_SESSION_TYPE").to_lowercase().as_str() {
            "wayland" => return SessionType::Wayland,
            "x11" => return SessionType::X11,
            _ => {}
        }

        if !self.var("WAYLAND_DISPLAY").is_empty() {
            SessionType::Wayland
        } else if !self.var("DISPLAY").is_empty() {
            SessionType::X11
        } else {
            SessionType::Unknown
        }
    }

    pub fn desktop_environment(&self) -> DesktopEnvironment {
        let combined = format!(
            "{} {}",
            self.var("XDG_CURRENT_DESKTOP"),
            self.var("DESKTOP_SESSION")
        )
        .to_lowercase();

        let table = [
            ("gnome", DesktopEnvironment::Gnome),
            ("kde", DesktopEnvironment::Kde),
            ("plasma", DesktopEnvironment::Kde),
            ("xfce", DesktopEnvironment::Xfce),
            ("cinnamon", DesktopEnvironment::Cinnamon),
            ("mate", DesktopEnvironment::Mate),
            ("lxqt", DesktopEnvironment::Lxqt),
            ("hyprland", DesktopEnvironment::Hyprland),
            ("sway", DesktopEnvironment::Sway),
        ];

        table
            .into_iter()
            .find(|(needle, _)| combined.contains(needle))
            .map_or(DesktopEnvironment::Unknown, |(_, de)| de)
    }

    /// Whether the XDG Desktop Portal answers on the session bus.
    pub fn has_portal_support(&self) -> bool {
        let probes = [
            (
                "busctl",
                vec![
                    "--user",
                    "introspect",
                    PORTAL_BUS_NAME,
                    PORTAL_OBJECT_PATH,
                ],
            ),
            (
                "gdbus",
                vec![
                    "introspect",
                    "--session",
                    "--dest",
                    PORTAL_BUS_NAME,
                    "--object-path",
                    PORTAL_OBJECT_PATH,
                ],
            ),
        ];

        probes.into_iter().any(|(tool, args)| {
            let Some(program) = self.find_executable(tool) else {
                return false;
            };
            let invocation = Invocation::new(
                program.to_string_lossy(),
                args,
                PORTAL_PROBE_TIMEOUT,
            );
            let found = self.runner.succeeds(&invocation);
            debug!(tool = tool, found = found, "Portal probe");
            found
        })
    }

    pub fn has_xdotool(&self) -> bool {
        self.find_executable("xdotool").is_some()
    }

    pub fn has_ydotool(&self) -> bool {
        self.find_executable("ydotool").is_some()
    }

    pub fn has_nerd_dictation(&self) -> bool {
        self.find_executable("nerd-dictation").is_some()
    }

    /// Best injection backend for this session, or `None` if nothing is installed.
    pub fn recommended_backend(&self) -> Option<BackendKind> {
        match self.session_type() {
            SessionType::Wayland => {
                if self.has_portal_support() {
                    return Some(BackendKind::Portal);
                }
                if self.has_ydotool() {
                    return Some(BackendKind::Ydotool);
                }
            }
            SessionType::X11 => {
                if self.has_xdotool() {
                    return Some(BackendKind::Xdotool);
                }
            }
            SessionType::Unknown => {}
        }

        if self.has_portal_support() {
            Some(BackendKind::Portal)
        } else if self.has_xdotool() {
            Some(BackendKind::Xdotool)
        } else if self.has_ydotool() {
            Some(BackendKind::Ydotool)
        } else {
            None
        }
    }

    /// Everything the probe knows in one snapshot.
    pub fn environment_info(&self) -> EnvironmentInfo {
        EnvironmentInfo {
            session_type: self.session_type(),
            desktop_environment: self.desktop_environment(),
            has_portal: self.has_portal_support(),
            has_xdotool: self.has_xdotool(),
            has_ydotool: self.has_ydotool(),
            has_nerd_dictation: self.has_nerd_dictation(),
            has_whisper: cfg!(feature = "whisper"),
            has_faster_whisper: cfg!(feature = "whisper"),
            has_parakeet: cfg!(feature = "parakeet"),
            recommended_backend: self.recommended_backend(),
        }
    }
}

fn is_executable(path: &std::path::Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "environment_test.rs"]
mod tests;
