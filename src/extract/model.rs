//! Model extraction.
//!
//! Strategies, in order: the source's own model field, the longest known
//! model phrase found in the text, then a heuristic read of the tokens that
//! follow the brand. Every result goes through the model alias table.

use regex::Regex;
use std::sync::OnceLock;

use super::size::size_match_start;
use crate::text::{contains_token, normalize};
use crate::vocab::Vocabulary;

/// Generic tire vocabulary that never names a model.
const STOP_WORDS: &[&str] = &[
    "pneu", "pneus", "aro", "tl", "tt", "xl", "runflat", "run", "flat", "rft", "reforce",
    "reforcado", "reforzado", "radial", "tubeless", "tubetype", "indice", "indicecarga", "kit",
    "novo", "com", "de", "para", "e", "h", "v", "t", "w", "y", "z", "r", "s", "q",
];

/// Maximum tokens kept by the after-brand heuristic.
const MAX_HEURISTIC_TOKENS: usize = 3;

fn noise_token() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| {
        Regex::new(
            r"^(?:z?r\d{2}|\d{1,3}|\d{2,3}[a-z]{1,2}|\d{2,3}/\d{2,3}[a-z]*\d*|\d{2,3}x\d+[a-z0-9.]*)$",
        )
        .expect("noise token pattern must compile")
    })
}

/// Resolve a model for `text` given the already-resolved `brand`.
pub fn extract_model(
    text: &str,
    brand: &str,
    expected: Option<&str>,
    vocab: &Vocabulary,
) -> String {
    if let Some(expected) = expected {
        let model = vocab.canonical_model(&normalize(expected));
        if !model.is_empty() && model != brand {
            return model;
        }
    }

    let norm = normalize(text);
    if norm.is_empty() {
        return String::new();
    }

    if let Some(model) = known_phrase_in(&norm, brand, vocab) {
        return model;
    }

    after_brand_heuristic(&norm, brand, vocab).unwrap_or_default()
}

fn known_phrase_in(norm: &str, brand: &str, vocab: &Vocabulary) -> Option<String> {
    vocab
        .model_phrases()
        .iter()
        .filter(|phrase| contains_token(norm, phrase))
        .map(|phrase| vocab.canonical_model(phrase))
        .find(|model| model != brand)
}

fn after_brand_heuristic(norm: &str, brand: &str, vocab: &Vocabulary) -> Option<String> {
    if brand.is_empty() {
        return None;
    }

    let padded = format!(" {} ", norm);
    let marker = format!(" {} ", brand);
    let idx = padded.find(&marker)?;
    let mut after = padded[idx + marker.len()..].trim().to_string();

    if let Some(cut) = size_match_start(&after) {
        after.truncate(cut);
    }

    let after = after.replace(['/', '-', '_', ','], " ");
    let tokens: Vec<&str> = after
        .split_whitespace()
        .filter(|tok| !STOP_WORDS.contains(tok) && !noise_token().is_match(tok))
        .take(MAX_HEURISTIC_TOKENS)
        .collect();

    if tokens.is_empty() {
        return None;
    }

    let guess = vocab.canonical_model(&tokens.join(" "));
    if guess.is_empty() || guess == brand {
        None
    } else {
        Some(guess)
    }
}
