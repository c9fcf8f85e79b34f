//! Problem-signature normalization: a free-text problem description becomes a
//! stable matching key.

use once_cell::sync::Lazy;
use regex::Regex;

static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[t_ ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:z|[+-]\d{2}:?\d{2})?")
        .expect("iso timestamp regex")
});
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[-/]\d{1,2}[-/]\d{1,2}\b").expect("date regex"));
static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?\b").expect("clock regex"));
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("uuid regex")
});
static WINDOWS_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]:\\\S+").expect("windows path regex"));
static UNIX_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:~|/)[\w.@+-]+(?:/[\w.@+-]+)*/?").expect("unix path regex"));
static LINE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bline \d+\b|:\d+:\d+\b").expect("line ref regex"));
static LONG_HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:0x)?[0-9a-f]{8,}\b").expect("hex regex"));
static NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9:_.'+-]+").expect("noise regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("spaces regex"));

const MAX_SIGNATURE_CHARS: usize = 200;

/// Normalize a problem description into a matching key.
///
/// Case-folds, strips volatile tokens (timestamps, file paths, uuids, long
/// hex identifiers, line references), collapses whitespace, and keeps the
/// stable error-class vocabulary: exception names, command names, port
/// numbers, package names. Deterministic, but approximate: two phrasings of
/// the same defect are expected, not guaranteed, to collide. Never treat
/// signature equality as proof of problem identity.
pub fn normalize(problem_text: &str) -> String {
    let mut text = problem_text.to_lowercase();

    for volatile in [
        &*ISO_TIMESTAMP,
        &*DATE,
        &*CLOCK,
        &*UUID,
        &*WINDOWS_PATH,
        &*UNIX_PATH,
        &*LINE_REF,
        &*LONG_HEX,
    ] {
        text = volatile.replace_all(&text, " ").into_owned();
    }

    let text = NOISE.replace_all(&text, " ");
    let text = SPACES.replace_all(text.trim(), " ").into_owned();

    if text.chars().count() > MAX_SIGNATURE_CHARS {
        text.chars().take(MAX_SIGNATURE_CHARS).collect::<String>().trim_end().to_string()
    } else {
        text
    }
}
