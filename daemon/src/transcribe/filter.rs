//! Removal of non-speech annotations from model output.
//!
//! Whisper-family models emit markers such as `[Music]` or `(Applause)` for
//! background noise, which must never reach the focused window.

use regex::Regex;
use std::sync::LazyLock;

/// Markers removed verbatim before the generic sweep.
pub const NON_SPEECH_MARKERS: [&str; 21] = [
    "[Musique]",
    "[Music]",
    "[MUSIC]",
    "[Applaudissements]",
    "[Applause]",
    "[APPLAUSE]",
    "[Rires]",
    "[Laughter]",
    "[LAUGHTER]",
    "[Bruit]",
    "[Noise]",
    "[NOISE]",
    "[Silence]",
    "[SILENCE]",
    "[Inaudible]",
    "[INAUDIBLE]",
    "(Musique)",
    "(Music)",
    "*Musique*",
    "*Music*",
    "...",
];

static BRACKETED_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)"));

/// Strip non-speech markers and collapse whitespace.
pub fn filter_non_speech(text: &str) -> String {
    let mut cleaned = text.to_string();
    for marker in NON_SPEECH_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }

    if let Ok(re) = &*BRACKETED_RE {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Filter every segment and join the ones that still carry speech.
pub fn join_segments<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|segment| filter_non_speech(segment.as_ref()))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_markers_and_annotations() {
        assert_eq!(
            filter_non_speech("[Musique] Bonjour (Applaudissements) le monde..."),
            "Bonjour le monde"
        );
    }

    #[test]
    fn test_generic_brackets_removed() {
        assert_eq!(filter_non_speech("[toux] oui (rire) non"), "oui non");
    }

    #[test]
    fn test_only_markers_yields_empty() {
        assert_eq!(filter_non_speech(" [Music] [SILENCE] ... "), "");
        assert_eq!(filter_non_speech(""), "");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(filter_non_speech("  l'été arrive  "), "l'été arrive");
    }

    #[test]
    fn test_join_skips_empty_segments() {
        let joined = join_segments([" Bonjour.", "[Music]", " Comment ça va ?"]);
        assert_eq!(joined, "Bonjour. Comment ça va ?");
    }

    #[test]
    fn test_join_nothing() {
        assert_eq!(join_segments(Vec::<String>::new()), "");
    }
}
