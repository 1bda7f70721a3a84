//! Environment report and dependency check.

use std::io::{self, Write};

use linvoc_daemon::engine::EngineKind;
use linvoc_daemon::environment::{EnvironmentInfo, SessionType};
use linvoc_daemon::models::ModelStatus;

fn mark(present: bool) -> &'static str {
    if present { "✓" } else { "✗" }
}

/// Print the environment snapshot.
pub fn print_info(info: &EnvironmentInfo, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "=== linvoc environment ===")?;
    writeln!(out, "Session: {}", info.session_type.as_str())?;
    writeln!(out, "Desktop: {}", info.desktop_environment.as_str())?;
    writeln!(out, "XDG portal: {}", mark(info.has_portal))?;
    writeln!(out, "xdotool: {}", mark(info.has_xdotool))?;
    writeln!(out, "ydotool: {}", mark(info.has_ydotool))?;
    writeln!(out, "nerd-dictation (VOSK): {}", mark(info.has_nerd_dictation))?;
    writeln!(out, "whisper.cpp (Whisper): {}", mark(info.has_whisper))?;
    writeln!(
        out,
        "whisper.cpp beam search (faster-whisper): {}",
        mark(info.has_faster_whisper)
    )?;
    writeln!(out, "ONNX Runtime (Parakeet): {}", mark(info.has_parakeet))?;
    writeln!(
        out,
        "Recommended backend: {}",
        info.recommended_backend.map_or("none", |kind| kind.as_str())
    )?;
    writeln!(out, "==========================")
}

/// What is missing to dictate with `engine` in this session.
pub fn missing_dependencies(info: &EnvironmentInfo, engine: EngineKind) -> Vec<String> {
    let mut missing = Vec::new();

    match engine {
        EngineKind::Vosk if !info.has_nerd_dictation => missing.push(
            "nerd-dictation is not installed.\n    \
             Install: pip install \"git+https://github.com/ideasman42/nerd-dictation.git#subdirectory=package/python\"\n    \
             Model: extract a VOSK model into ~/.config/nerd-dictation/model"
                .to_string(),
        ),
        EngineKind::Whisper if !info.has_whisper => {
            missing.push(rebuild_hint("Whisper", "whisper"));
        }
        EngineKind::FasterWhisper if !info.has_faster_whisper => {
            missing.push(rebuild_hint("faster-whisper", "whisper"));
        }
        EngineKind::Parakeet if !info.has_parakeet => {
            missing.push(rebuild_hint("Parakeet", "parakeet"));
        }
        _ => {}
    }

    if info.recommended_backend.is_none() {
        let hint = if info.session_type == SessionType::X11 {
            "Install (X11): sudo apt install xdotool"
        } else {
            "Install (Wayland): sudo apt install wl-clipboard ydotool\n    \
             Then: sudo systemctl enable --now ydotool"
        };
        missing.push(format!("No text injection tool found.\n    {hint}"));
    }

    missing
}

fn rebuild_hint(engine: &str, feature: &str) -> String {
    format!(
        "The {engine} runtime is not part of this build.\n    \
         Rebuild with: cargo install linvoc --features {feature}"
    )
}

/// Print whether the engine's model is already on disk. Informational only:
/// a missing or damaged model is fetched on first use.
pub fn print_model_status(status: &ModelStatus, out: &mut impl Write) -> io::Result<()> {
    match status {
        ModelStatus::Ready(path) => writeln!(out, "Model: ✓ {}", path.display()),
        ModelStatus::Missing => writeln!(out, "Model: not downloaded yet, fetched on first use"),
        ModelStatus::Corrupted {
            path,
            expected,
            actual,
        } => writeln!(
            out,
            "Model: ✗ {} is {actual} bytes instead of {expected}, re-downloaded on first use",
            path.display()
        ),
    }
}

/// Print the missing dependencies. Returns whether nothing is missing.
pub fn print_missing(missing: &[String], out: &mut impl Write) -> io::Result<bool> {
    if missing.is_empty() {
        return Ok(true);
    }
    writeln!(out, "⚠️  Missing dependencies:\n")?;
    for item in missing {
        writeln!(out, "  • {item}\n")?;
    }
    Ok(false)
}
