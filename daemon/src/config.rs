//! Configuration management for linvoc.
//!
//! Handles loading, saving, and providing defaults for the configuration, and
//! merging command-line overrides on top of it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dictation::EngineSelection;
use crate::inject::{DEFAULT_KEY_DELAY_MS, InjectorSettings};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub injection: InjectionConfig,
    pub logging: LoggingConfig,
    pub daemon: DaemonConfig,
}

/// Speech engine selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// "vosk", "whisper", "faster-whisper" or "parakeet". Unknown keys run vosk.
    pub kind: String,
    /// Language code passed to the recognizer.
    pub language: String,
    /// Whisper model size: "tiny", "base", "small", "medium" or "large".
    pub model_size: String,
    /// Explicit model name, e.g. "nvidia/parakeet-tdt-0.6b-v3".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// VOSK model directory, or download directory for the other engines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let selection = EngineSelection::default();
        Self {
            kind: selection.kind,
            language: selection.language,
            model_size: selection.model_size,
            model_name: None,
            model_dir: None,
        }
    }
}

/// Text injection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub backend: BackendChoice,
    /// Delay between simulated keystrokes.
    pub key_delay_ms: u32,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            key_delay_ms: DEFAULT_KEY_DELAY_MS,
        }
    }
}

/// Injection backend requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Pick from the session type and installed tools.
    #[default]
    Auto,
    Xdotool,
    Portal,
    Ydotool,
}

impl BackendChoice {
    /// Backend name to force, `None` for automatic selection.
    pub fn forced(&self) -> Option<&'static str> {
        match self {
            BackendChoice::Auto => None,
            BackendChoice::Xdotool => Some("xdotool"),
            BackendChoice::Portal => Some("portal"),
            BackendChoice::Ydotool => Some("ydotool"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: LogLevel,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Behaviour of a running instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Start recording as soon as the instance is up.
    pub start_immediately: bool,
    /// Load the speech model at startup instead of on the first toggle.
    pub preload: bool,
}

/// Command-line values taking precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub engine: Option<String>,
    pub language: Option<String>,
    pub model_size: Option<String>,
    pub model_name: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub backend: Option<BackendChoice>,
    /// Flags only ever switch the behaviour on.
    pub start_immediately: bool,
    pub preload: bool,
}

impl Config {
    /// Returns the default config directory path.
    /// `~/.config/linvoc/` (or `$XDG_CONFIG_HOME/linvoc/`)
    pub fn config_dir() -> Result<PathBuf> {
        linvoc_common::dirs::config_dir()
    }

    /// Returns the default config file path.
    /// `~/.config/linvoc/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load configuration from the default path.
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file as TOML")
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Merge command-line values on top of the file.
    pub fn apply(&mut self, overrides: Overrides) {
        let engine = &mut self.engine;
        if let Some(kind) = overrides.engine {
            engine.kind = kind;
        }
        if let Some(language) = overrides.language {
            engine.language = language;
        }
        if let Some(size) = overrides.model_size {
            engine.model_size = size;
        }
        if overrides.model_name.is_some() {
            engine.model_name = overrides.model_name;
        }
        if overrides.model_dir.is_some() {
            engine.model_dir = overrides.model_dir;
        }
        if let Some(backend) = overrides.backend {
            self.injection.backend = backend;
        }
        self.daemon.start_immediately |= overrides.start_immediately;
        self.daemon.preload |= overrides.preload;
    }

    pub fn engine_selection(&self) -> EngineSelection {
        EngineSelection {
            kind: self.engine.kind.clone(),
            language: self.engine.language.clone(),
            model_size: self.engine.model_size.clone(),
            model_name: self.engine.model_name.clone(),
            model_dir: self.engine.model_dir.clone(),
        }
    }

    pub fn injector_settings(&self) -> InjectorSettings {
        InjectorSettings {
            forced_backend: self.injection.backend.forced().map(String::from),
            key_delay_ms: self.injection.key_delay_ms,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
