//! Command-line surface.

use clap::{Parser, ValueEnum};
use linvoc_daemon::config::{BackendChoice, Overrides};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "linvoc")]
#[command(about = "linvoc - push-to-toggle voice dictation for Linux desktops")]
#[command(version)]
#[command(after_help = "Examples:
  linvoc                             Launch with the VOSK engine
  linvoc --engine whisper            Use Whisper
  linvoc --daemon --engine parakeet  Run Parakeet in the background
  linvoc --toggle                    Toggle the running daemon
  linvoc --check                     Check dependencies")]
pub struct Args {
    /// Print environment information and exit
    #[arg(short, long)]
    pub info: bool,

    /// Check dependencies and exit
    #[arg(short, long)]
    pub check: bool,

    /// Dictation language code [default: fr]
    #[arg(short, long = "lang", value_name = "CODE")]
    pub lang: Option<String>,

    /// Text injection backend [default: auto]
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Speech recognition engine [default: vosk]
    #[arg(short, long, value_enum)]
    pub engine: Option<EngineArg>,

    /// Whisper model size [default: base]
    #[arg(short, long, value_enum)]
    pub model_size: Option<ModelSizeArg>,

    /// Parakeet model name [default: nvidia/parakeet-tdt-0.6b-v3]
    #[arg(long, value_name = "NAME")]
    pub parakeet_model: Option<String>,

    /// VOSK model directory, or download directory for the other engines
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Run as a persistent background instance
    #[arg(long)]
    pub daemon: bool,

    /// Toggle recording on the running daemon and exit
    #[arg(long, conflicts_with_all = ["info", "check", "daemon"])]
    pub toggle: bool,

    /// Start recording immediately
    #[arg(short, long)]
    pub start: bool,

    /// Load the speech model at startup
    #[arg(long)]
    pub force_preload: bool,

    /// Configuration file [default: ~/.config/linvoc/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Auto,
    Xdotool,
    Portal,
    Ydotool,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Xdotool => BackendChoice::Xdotool,
            BackendArg::Portal => BackendChoice::Portal,
            BackendArg::Ydotool => BackendChoice::Ydotool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    Vosk,
    Whisper,
    FasterWhisper,
    Parakeet,
}

impl EngineArg {
    pub fn key(&self) -> &'static str {
        match self {
            EngineArg::Vosk => "vosk",
            EngineArg::Whisper => "whisper",
            EngineArg::FasterWhisper => "faster-whisper",
            EngineArg::Parakeet => "parakeet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelSizeArg {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSizeArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSizeArg::Tiny => "tiny",
            ModelSizeArg::Base => "base",
            ModelSizeArg::Small => "small",
            ModelSizeArg::Medium => "medium",
            ModelSizeArg::Large => "large",
        }
    }
}

impl Args {
    /// Values to merge on top of the configuration file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            engine: self.engine.map(|engine| engine.key().to_string()),
            language: self.lang.clone(),
            model_size: self.model_size.map(|size| size.as_str().to_string()),
            model_name: self.parakeet_model.clone(),
            model_dir: self.model_dir.clone(),
            backend: self.backend.map(BackendChoice::from),
            start_immediately: self.start,
            preload: self.force_preload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("linvoc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_flags_override_nothing() {
        assert_eq!(parse(&[]).overrides(), Overrides::default());
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&[
            "-l",
            "en",
            "-e",
            "faster-whisper",
            "-m",
            "small",
            "-b",
            "portal",
            "-s",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.language.as_deref(), Some("en"));
        assert_eq!(overrides.engine.as_deref(), Some("faster-whisper"));
        assert_eq!(overrides.model_size.as_deref(), Some("small"));
        assert_eq!(overrides.backend, Some(BackendChoice::Portal));
        assert!(overrides.start_immediately);
    }

    #[test]
    fn test_parakeet_model_and_preload() {
        let args = parse(&[
            "--engine",
            "parakeet",
            "--parakeet-model",
            "nvidia/parakeet-tdt-0.6b-v2",
            "--force-preload",
            "--daemon",
        ]);
        assert!(args.daemon);
        let overrides = args.overrides();
        assert_eq!(
            overrides.model_name.as_deref(),
            Some("nvidia/parakeet-tdt-0.6b-v2")
        );
        assert!(overrides.preload);
    }

    #[test]
    fn test_unknown_engine_rejected() {
        assert!(Args::try_parse_from(["linvoc", "--engine", "kaldi"]).is_err());
    }

    #[test]
    fn test_toggle_conflicts_with_daemon() {
        assert!(Args::try_parse_from(["linvoc", "--toggle", "--daemon"]).is_err());
    }

    #[test]
    fn test_info_and_check_short_flags() {
        let args = parse(&["-i", "-c"]);
        assert!(args.info);
        assert!(args.check);
    }
}
