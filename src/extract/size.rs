//! Tire size extraction.
//!
//! Patterns are tried in order and the first match wins. Every pattern is
//! anchored on the width/aspect/rim triple with non-digit boundaries, so a
//! lone rim mention (`aro 15`) or a load index (`91`) never matches on its
//! own.

use regex::Regex;
use std::sync::OnceLock;

use crate::text::fold;

/// Shape of the canonical output for a pattern.
#[derive(Clone, Copy)]
enum SizeShape {
    /// `WWW/AARBB`
    Metric,
    /// `WWXAA.ARBB` (flotation / off-road)
    Flotation,
}

struct SizePattern {
    regex: Regex,
    shape: SizeShape,
}

fn patterns() -> &'static [SizePattern] {
    static PATTERNS: OnceLock<Vec<SizePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // 195/65R15, 195 65 r15, 195x55ZR16, 195-65-R15, 205/55 RF 16
            (
                r"(?:^|[^0-9])(\d{3})\s*[/x\- ]\s*(\d{2})\s*-?\s*z?r\s*f?\s*-?\s*(\d{2})(?:[^0-9]|$)",
                SizeShape::Metric,
            ),
            // 195/65 15, 195-65 15
            (
                r"(?:^|[^0-9])(\d{3})\s*[/\-]\s*(\d{2})\s+(\d{2})(?:[^0-9]|$)",
                SizeShape::Metric,
            ),
            // 19565R15, 19555ZR16
            (
                r"(?:^|[^0-9])(\d{3})(\d{2})z?rf?(\d{2})(?:[^0-9]|$)",
                SizeShape::Metric,
            ),
            // 31x10.5R15, 33x12,50 r 17
            (
                r"(?:^|[^0-9])(\d{2})\s*x\s*(\d{1,2}(?:[.,]\d{1,2})?)\s*-?\s*r\s*(\d{2})(?:[^0-9]|$)",
                SizeShape::Flotation,
            ),
        ]
        .into_iter()
        .map(|(pattern, shape)| SizePattern {
            regex: Regex::new(pattern).expect("size pattern must compile"),
            shape,
        })
        .collect()
    })
}

/// Extract a canonical size (`195/65R15`) from free text; empty when no
/// pattern matches.
pub fn extract_size(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let folded = fold(text);

    for pattern in patterns() {
        if let Some(caps) = pattern.regex.captures(&folded) {
            let width = &caps[1];
            let aspect = caps[2].replace(',', ".");
            let rim = &caps[3];
            let size = match pattern.shape {
                SizeShape::Metric => format!("{}/{}R{}", width, aspect, rim),
                SizeShape::Flotation => format!("{}x{}R{}", width, aspect, rim),
            };
            return size.to_uppercase();
        }
    }

    String::new()
}

/// Byte offset where the first size notation in `text` begins (the width
/// digits, not the boundary character). `text` should already be folded.
pub fn size_match_start(text: &str) -> Option<usize> {
    patterns()
        .iter()
        .find_map(|pattern| pattern.regex.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.start())
}

/// Explicit size field first, title second.
pub fn size_from_fields(size_raw: Option<&str>, title: &str) -> String {
    if let Some(raw) = size_raw {
        let size = extract_size(raw);
        if !size.is_empty() {
            return size;
        }
    }
    extract_size(title)
}

/// Canonical form of a user-supplied size filter (`195-65 r15` →
/// `195/65R15`). Falls back to an upper-cased, space-free form so that
/// unusual notations still compare consistently.
pub fn canonical_size_filter(input: &str) -> String {
    let size = extract_size(input);
    if !size.is_empty() {
        return size;
    }
    fold(input).replace(' ', "").to_uppercase()
}
