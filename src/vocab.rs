//! Immutable brand/model vocabulary.
//!
//! Built once from [`VocabularyConfig`] at the start of a run and passed by
//! reference into every extractor call. All entries are stored in
//! [`normalize`]d form so lookups compare like with like.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::VocabularyConfig;
use crate::text::normalize;

#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Known brands in configured order; earlier entries win when a title
    /// names more than one.
    brands: Vec<String>,
    brand_set: BTreeSet<String>,
    brand_aliases: BTreeMap<String, String>,
    /// Known model phrases, longest first (ties alphabetical).
    model_phrases: Vec<String>,
    model_aliases: BTreeMap<String, String>,
}

impl Vocabulary {
    pub fn from_config(config: &VocabularyConfig) -> Self {
        let mut brands = Vec::new();
        let mut brand_set = BTreeSet::new();
        for brand in config.known_brands.iter().map(|b| normalize(b)) {
            if !brand.is_empty() && brand_set.insert(brand.clone()) {
                brands.push(brand);
            }
        }

        let phrase_set: BTreeSet<String> = config
            .known_model_phrases
            .iter()
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            brands,
            brand_set,
            brand_aliases: normalize_map(&config.brand_aliases),
            model_phrases: longest_first(&phrase_set),
            model_aliases: normalize_map(&config.model_aliases),
        }
    }

    pub fn brands(&self) -> &[String] {
        &self.brands
    }

    pub fn is_known_brand(&self, brand: &str) -> bool {
        self.brand_set.contains(brand)
    }

    pub fn brand_aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        // Longest alias first so "good year" wins over "good".
        let mut pairs: Vec<(&str, &str)> = self
            .brand_aliases
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        pairs.into_iter()
    }

    pub fn brand_alias(&self, alias: &str) -> Option<&str> {
        self.brand_aliases.get(alias).map(String::as_str)
    }

    pub fn model_phrases(&self) -> &[String] {
        &self.model_phrases
    }

    /// Map a normalized model through the alias table (identity otherwise).
    pub fn canonical_model(&self, model: &str) -> String {
        self.model_aliases
            .get(model)
            .cloned()
            .unwrap_or_else(|| model.to_string())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_config(&VocabularyConfig::default())
    }
}

fn longest_first(set: &BTreeSet<String>) -> Vec<String> {
    let mut items: Vec<String> = set.iter().cloned().collect();
    items.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    items
}

fn normalize_map(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (normalize(k), normalize(v)))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}
