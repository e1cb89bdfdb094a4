//! Language code to display-name mapping used when rendering prompts.

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ko", "Korean"),
    ("ja", "Japanese"),
    ("zh", "Chinese"),
    ("zh-cn", "Simplified Chinese"),
    ("zh-tw", "Traditional Chinese"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("ru", "Russian"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("vi", "Vietnamese"),
    ("th", "Thai"),
    ("id", "Indonesian"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
];

pub const FALLBACK_LANGUAGE: &str = "English";

/// English name for a language code (`"ko"` -> `"Korean"`).
pub fn language_name(code: &str) -> Option<&'static str> {
    let code = normalize_code(code);
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

/// Name to put in a prompt. Unknown codes are passed through so that callers
/// may also supply a language name directly.
pub fn prompt_language(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return FALLBACK_LANGUAGE.to_string();
    }
    language_name(trimmed)
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.to_string())
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}
