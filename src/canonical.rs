//! Canonicalization: attach brand, model, size, and identity key to each
//! normalized listing, and the brand/size/model filters applied after it.

use crate::extract::{canonical_size_filter, extract_brand, extract_model, size_from_fields};
use crate::key::{build_key, fallback_text};
use crate::models::{CanonicalListing, NormalizedListing};
use crate::text::normalize;
use crate::vocab::Vocabulary;

pub fn canonicalize(listing: NormalizedListing, vocab: &Vocabulary) -> CanonicalListing {
    let size = size_from_fields(listing.size_raw.as_deref(), &listing.title);
    let brand = extract_brand(&listing.title, listing.brand_raw.as_deref(), vocab);
    let model = extract_model(&listing.title, &brand, listing.model_raw.as_deref(), vocab);

    let key = build_key(
        &brand,
        &size,
        &model,
        fallback_text(
            listing.sku.as_deref(),
            &listing.title,
            listing.url.as_deref(),
        ),
    );

    CanonicalListing {
        listing,
        brand,
        model,
        size,
        canonical_key: key.key,
        key_tier: key.tier,
    }
}

pub fn canonicalize_all(listings: Vec<NormalizedListing>, vocab: &Vocabulary) -> Vec<CanonicalListing> {
    listings
        .into_iter()
        .map(|listing| canonicalize(listing, vocab))
        .collect()
}

/// Optional restriction of a run to one brand, size, and/or model.
/// Values are compared in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub brand: Option<String>,
    pub size: Option<String>,
    pub model: Option<String>,
}

impl Filters {
    pub fn new(
        brand: Option<&str>,
        size: Option<&str>,
        model: Option<&str>,
        vocab: &Vocabulary,
    ) -> Self {
        let brand = brand.map(normalize).filter(|b| !b.is_empty()).map(|b| {
            vocab
                .brand_alias(&b)
                .map(str::to_string)
                .unwrap_or(b)
        });
        let size = size
            .filter(|s| !s.trim().is_empty())
            .map(canonical_size_filter);
        let model = model
            .map(normalize)
            .filter(|m| !m.is_empty())
            .map(|m| vocab.canonical_model(&m));

        Self { brand, size, model }
    }

    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.size.is_none() && self.model.is_none()
    }

    pub fn matches(&self, listing: &CanonicalListing) -> bool {
        self.brand.as_deref().map_or(true, |b| listing.brand == b)
            && self.size.as_deref().map_or(true, |s| listing.size == s)
            && self.model.as_deref().map_or(true, |m| listing.model == m)
    }

    pub fn apply(&self, listings: Vec<CanonicalListing>) -> Vec<CanonicalListing> {
        if self.is_empty() {
            return listings;
        }
        listings.into_iter().filter(|l| self.matches(l)).collect()
    }

    /// Human-readable form for diagnostics (`brand=dunlop size=195/65R15`).
    pub fn describe(&self) -> String {
        [
            ("brand", &self.brand),
            ("size", &self.size),
            ("model", &self.model),
        ]
        .iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{}={}", name, v)))
        .collect::<Vec<_>>()
        .join(" ")
    }
}
