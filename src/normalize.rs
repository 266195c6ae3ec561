//! Text cleanup applied to titles and bodies before scoring

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{NormalizedRecord, RawRecord};

// Scheme or www-prefixed runs up to the next whitespace, starting a word
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid URL pattern")
});

static NON_WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\w\s]").expect("valid punctuation pattern")
});

/// Clean a piece of text for searching and scoring.
///
/// Strips URLs, then everything that is not a word character or whitespace,
/// collapses whitespace runs and lower-cases the result. Applying it twice
/// gives the same output as applying it once.
pub fn normalize(text: &str) -> String {
    let text = URL_PATTERN.replace_all(text, "");
    let text = NON_WORD_PATTERN.replace_all(&text, "");
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// [`normalize`] for fields a platform may leave out.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Attach cleaned title, body and combined text to a raw record.
pub fn normalize_record(raw: RawRecord) -> NormalizedRecord {
    let title_clean = normalize(&raw.title);
    let text_clean = normalize(&raw.text);
    let full_text = format!("{} {}", title_clean, text_clean).trim().to_string();

    NormalizedRecord {
        raw,
        title_clean,
        text_clean,
        full_text,
    }
}
