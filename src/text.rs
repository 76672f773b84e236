//! Text folding used for every comparison in the pipeline.
//!
//! [`normalize`] is the comparison form: lower-case ASCII letters, digits,
//! `/` and `-`, single spaces. Display values (titles, URLs) are never
//! rewritten with it; it only feeds extractors, keys, and dedup.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-case, strip diacritics, replace anything outside `[a-z0-9 /-]`
/// with a space, collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    let folded: String = strip_marks(text)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '/' || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&folded)
}

/// [`normalize`] for nullable source values.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Lower-case and strip diacritics but keep punctuation. Sizes such as
/// `31x10.5R15` need the decimal point that [`normalize`] would drop.
pub fn fold(text: &str) -> String {
    collapse_whitespace(&strip_marks(text))
}

/// Fragment usable inside a file name: separators become `-`, anything
/// outside `[A-Za-z0-9_.=-]` becomes `-`, repeated dashes collapse.
pub fn safe_part(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars() {
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '=') {
            c
        } else {
            '-'
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "NA".to_string()
    } else {
        trimmed.to_string()
    }
}

/// True when `needle` occurs in `haystack` delimited by spaces or the ends.
/// Both sides are expected in [`normalize`]d form.
pub fn contains_token(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = start == 0 || haystack.as_bytes()[start - 1] == b' ';
        let after_ok = end == haystack.len() || haystack.as_bytes()[end] == b' ';
        before_ok && after_ok
    })
}

fn strip_marks(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
