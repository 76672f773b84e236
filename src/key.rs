//! Canonical identity keys.
//!
//! Two tiers: a structured `brand|size|model` key when at least two of the
//! three attributes were extracted, otherwise a `fb|<text>` key built from
//! the normalized SKU or title. Structured keys always hold two `|`
//! separators and fallback keys exactly one, and [`normalize`] strips `|`
//! from the fallback text, so the tiers cannot collide.

use sha2::{Digest, Sha256};

use crate::models::KeyTier;
use crate::text::normalize;

/// Stand-in for a missing component inside a structured key.
pub const PLACEHOLDER: &str = "unk";

/// Prefix of every fallback key.
pub const FALLBACK_PREFIX: &str = "fb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalKey {
    pub key: String,
    pub tier: KeyTier,
}

/// Build the identity key for one listing. Pure: equal inputs give equal keys.
pub fn build_key(brand: &str, size: &str, model: &str, fallback_text: &str) -> CanonicalKey {
    let parts = [brand.trim(), size.trim(), model.trim()];
    let missing = parts.iter().filter(|p| p.is_empty()).count();

    if missing >= 2 {
        let text = normalize(fallback_text);
        let text = if text.is_empty() { "empty".to_string() } else { text };
        return CanonicalKey {
            key: format!("{}|{}", FALLBACK_PREFIX, text),
            tier: KeyTier::Fallback,
        };
    }

    let key = parts
        .iter()
        .map(|p| if p.is_empty() { PLACEHOLDER } else { p })
        .collect::<Vec<_>>()
        .join("|");

    CanonicalKey {
        key,
        tier: KeyTier::Structured,
    }
}

/// Text used for the fallback tier: SKU first, then title, then URL.
pub fn fallback_text<'a>(sku: Option<&'a str>, title: &'a str, url: Option<&'a str>) -> &'a str {
    [sku, Some(title), url]
        .into_iter()
        .flatten()
        .find(|s| !normalize(s).is_empty())
        .unwrap_or("")
}

/// Short stable identifier for a canonical key (16 hex digits of SHA-256).
pub fn product_id(canonical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_key() {
        let k = build_key("dunlop", "195/65R15", "sp touring", "whatever");
        assert_eq!(k.key, "dunlop|195/65R15|sp touring");
        assert_eq!(k.tier, KeyTier::Structured);
    }

    #[test]
    fn test_one_missing_component_uses_placeholder() {
        let k = build_key("dunlop", "195/65R15", "", "title");
        assert_eq!(k.key, "dunlop|195/65R15|unk");
        assert_eq!(k.tier, KeyTier::Structured);
    }

    #[test]
    fn test_two_missing_components_fall_back() {
        let k = build_key("", "195/65R15", "", "Pneu Remold 195/65R15 Barato!");
        assert_eq!(k.key, "fb|pneu remold 195/65r15 barato");
        assert_eq!(k.tier, KeyTier::Fallback);
    }

    #[test]
    fn test_fallback_for_unrecognizable_title() {
        let k = build_key("", "", "", "produto sem descrição");
        assert_eq!(k.key, "fb|produto sem descricao");
        assert_eq!(k.key.matches('|').count(), 1);
    }

    #[test]
    fn test_fallback_never_empty() {
        let k = build_key("", "", "", "  ");
        assert_eq!(k.key, "fb|empty");
    }

    #[test]
    fn test_tiers_never_collide() {
        let structured = build_key("fb", "", "x", "");
        let fallback = build_key("", "", "", "x");
        assert_ne!(structured.key, fallback.key);
        assert_eq!(structured.key.matches('|').count(), 2);
    }

    #[test]
    fn test_fallback_text_order() {
        assert_eq!(fallback_text(Some("SKU-1"), "title", None), "SKU-1");
        assert_eq!(fallback_text(Some(" "), "title", None), "title");
        assert_eq!(fallback_text(None, "", Some("https://x/1")), "https://x/1");
        assert_eq!(fallback_text(None, "", None), "");
    }

    #[test]
    fn test_product_id_stable() {
        let a = product_id("dunlop|195/65R15|sp touring");
        assert_eq!(a.len(), 16);
        assert_eq!(a, product_id("dunlop|195/65R15|sp touring"));
        assert_ne!(a, product_id("dunlop|195/65R15|fm800"));
    }
}
