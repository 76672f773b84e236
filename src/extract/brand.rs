//! Brand extraction against the configured vocabulary.

use crate::text::{contains_token, normalize};
use crate::vocab::Vocabulary;

/// Resolve a brand for `text`.
///
/// Order: expected brand (canonicalized) → exact known brand → known brand
/// token inside the text → alias → empty. Free text never yields a brand
/// outside the vocabulary.
pub fn extract_brand(text: &str, expected: Option<&str>, vocab: &Vocabulary) -> String {
    if let Some(expected) = expected {
        let brand = canonical_expected_brand(expected, vocab);
        if !brand.is_empty() {
            return brand;
        }
    }

    let norm = normalize(text);
    if norm.is_empty() {
        return String::new();
    }

    if vocab.is_known_brand(&norm) {
        return norm;
    }

    if let Some(brand) = known_brand_in(&norm, vocab) {
        return brand;
    }

    if let Some(target) = vocab.brand_alias(&norm) {
        return target.to_string();
    }
    for (alias, target) in vocab.brand_aliases() {
        if contains_token(&norm, alias) {
            return target.to_string();
        }
    }

    String::new()
}

/// Canonical form of a brand that was supplied rather than found (a source
/// brand column or the originating search query). Unknown values are kept
/// in normalized form since the caller vouches for them.
fn canonical_expected_brand(expected: &str, vocab: &Vocabulary) -> String {
    let norm = normalize(expected);
    if norm.is_empty() {
        return norm;
    }
    if let Some(target) = vocab.brand_alias(&norm) {
        return target.to_string();
    }
    if vocab.is_known_brand(&norm) {
        return norm;
    }
    if let Some(brand) = known_brand_in(&norm, vocab) {
        return brand;
    }
    norm
}

fn known_brand_in(norm: &str, vocab: &Vocabulary) -> Option<String> {
    vocab
        .brands()
        .iter()
        .find(|brand| contains_token(norm, brand))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabularyConfig;

    fn vocab() -> Vocabulary {
        Vocabulary::from_config(&VocabularyConfig {
            known_brands: vec!["goodyear".into(), "dunlop".into(), "bf goodrich".into()],
            brand_aliases: [
                ("good year".to_string(), "goodyear".to_string()),
                ("kelly".to_string(), "goodyear".to_string()),
            ]
            .into_iter()
            .collect(),
            ..VocabularyConfig::default()
        })
    }

    #[test]
    fn test_expected_brand_wins() {
        let v = vocab();
        assert_eq!(extract_brand("Pneu Dunlop 205/55R16", Some("Goodyear"), &v), "goodyear");
        assert_eq!(extract_brand("", Some("Good Year"), &v), "goodyear");
        // Supplied but unknown: kept as given.
        assert_eq!(extract_brand("", Some("Westlake"), &v), "westlake");
    }

    #[test]
    fn test_blank_expected_falls_through() {
        let v = vocab();
        assert_eq!(extract_brand("Pneu Dunlop 205/55R16", Some("  "), &v), "dunlop");
    }

    #[test]
    fn test_exact_and_token_match() {
        let v = vocab();
        assert_eq!(extract_brand("DUNLOP", None, &v), "dunlop");
        assert_eq!(extract_brand("Pneu Dunlop 205/55R16", None, &v), "dunlop");
        assert_eq!(extract_brand("Pneu BF Goodrich KO2", None, &v), "bf goodrich");
    }

    #[test]
    fn test_alias_match() {
        let v = vocab();
        assert_eq!(extract_brand("Pneu Good Year Direction", None, &v), "goodyear");
        assert_eq!(extract_brand("kelly", None, &v), "goodyear");
    }

    #[test]
    fn test_unknown_brand_is_dropped() {
        let v = vocab();
        assert_eq!(extract_brand("Pneu Westlake RP18 175/70R13", None, &v), "");
        assert_eq!(extract_brand("", None, &v), "");
    }

    #[test]
    fn test_token_boundaries() {
        let v = vocab();
        assert_eq!(extract_brand("dunlopx 175/70R13", None, &v), "");
    }

    #[test]
    fn test_configured_order_breaks_ties() {
        let v = Vocabulary::default();
        assert_eq!(
            extract_brand("Pneu Pirelli Formula Evo 175/70R13 82T", None, &v),
            "pirelli"
        );
        assert_eq!(extract_brand("Pneu Formula Energy 175/65R14", None, &v), "formula");
    }
}
