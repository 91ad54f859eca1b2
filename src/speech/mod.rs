pub mod engine;
pub mod google;

pub use engine::{SpeechEngine, Synthesizer, Translator};

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::errors::AppError;

/// Spoken when no task produces audio, instead of an empty or error
/// response.
pub const FILLER_TEXT: &str = "No valid languages found";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language codes the synthesis collaborator accepts. Tag payloads and API
/// callers mix casings (`zh-tw` vs `zh-TW`), so lookups are
/// case-insensitive and resolve to the canonical form.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "af", "ar", "bg", "bn", "bs", "ca", "cs", "cy", "da", "de", "el", "en", "eo", "es", "et",
    "fi", "fr", "gu", "hi", "hr", "hu", "hy", "id", "is", "it", "iw", "ja", "jw", "km", "kn",
    "ko", "la", "lt", "lv", "ml", "mr", "ms", "my", "ne", "nl", "no", "pl", "pt", "ro", "ru",
    "si", "sk", "sq", "sr", "su", "sv", "sw", "ta", "te", "th", "tl", "tr", "uk", "ur", "vi",
    "zh", "zh-CN", "zh-TW",
];

static LANGUAGE_INDEX: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|code| (code.to_ascii_lowercase(), *code))
        .collect()
});

/// Canonical form of a supported language code, or None if unsupported.
pub fn canonical_language(code: &str) -> Option<&'static str> {
    LANGUAGE_INDEX.get(&code.to_ascii_lowercase()).copied()
}

/// Raw request body fields. Both shapes share one envelope; `parse` decides
/// which shape applies.
#[derive(Debug, Deserialize)]
pub struct SpeechPayload {
    pub localization: Option<HashMap<String, String>>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub translations: Option<Vec<String>>,
}

/// A validated synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechRequest {
    /// Shape (a): independent per-language utterances.
    Localized(Vec<(String, String)>),
    /// Shape (b): one source text fanned out through translation.
    Translated {
        text: String,
        language: String,
        targets: Vec<String>,
    },
}

impl SpeechRequest {
    /// Accepts either shape; anything else is `InvalidFormat`. Language
    /// validity is the engine's concern, not the parser's.
    pub fn parse(body: &serde_json::Value) -> Result<Self, AppError> {
        let payload: SpeechPayload =
            serde_json::from_value(body.clone()).map_err(|_| AppError::InvalidFormat)?;

        if let Some(map) = payload.localization {
            return Ok(Self::Localized(map.into_iter().collect()));
        }
        if let (Some(text), Some(language), Some(targets)) =
            (payload.text, payload.language, payload.translations)
        {
            return Ok(Self::Translated {
                text,
                language,
                targets,
            });
        }
        Err(AppError::InvalidFormat)
    }
}
