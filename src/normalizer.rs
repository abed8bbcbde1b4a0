//! Text normalization shared by indexing, chunking and matching.
//!
//! Every offset in the engine is computed against text that went through
//! [`normalize`], so the function must stay deterministic and idempotent:
//! `normalize(normalize(s)) == normalize(s)` for any input.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_ZERO_WIDTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{FEFF}\u{200B}\u{200C}\u{200D}]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r" +([.!?,;:])").unwrap());

/// Collapse all whitespace classes to single ASCII spaces, trim, and tidy
/// spacing before sentence-final punctuation.
pub fn normalize(raw: &str) -> String {
    // Zero-width characters go first: removing one after NFC could expose a
    // composition the second pass would then apply, breaking idempotence.
    let stripped = RE_ZERO_WIDTH.replace_all(raw, "");
    let folded: String = stripped.nfc().collect();
    let collapsed = RE_WHITESPACE.replace_all(&folded, " ");
    let tightened = RE_SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");
    tightened.trim().to_string()
}

/// Lowercased, punctuation-free form of a token, used for word matching.
pub fn normalized_word(token: &str) -> String {
    token
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Canonical full text of a reading session: `title + ". " + body`.
///
/// A trailing period run on the title is dropped first so the separator does
/// not double up.
pub fn compose_full_text(title: &str, body: &str) -> String {
    let title = normalize(title);
    let body = normalize(body);
    let title = title.trim_end_matches('.').trim_end();
    if title.is_empty() {
        return body;
    }
    if body.is_empty() {
        return format!("{title}.");
    }
    format!("{title}. {body}")
}
