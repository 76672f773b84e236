//! Listing deduplication.
//!
//! Three passes, each keeping survivors in input order:
//!
//! 1. exact duplicates (every field equal): first occurrence kept;
//! 2. listings with a URL: one per `(marketplace, normalized URL)`;
//! 3. listings without a URL: one per `(marketplace, seller, title, price,
//!    source file)`.
//!
//! In passes 2 and 3 the most recently collected listing wins. Missing
//! timestamps count as oldest and ties go to the later listing. Running
//! [`dedupe`] on its own output changes nothing.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::DedupConfig;
use crate::models::CanonicalListing;
use crate::text::normalize;

pub fn dedupe(listings: Vec<CanonicalListing>, config: &DedupConfig) -> Vec<CanonicalListing> {
    let listings = remove_exact_duplicates(listings);
    keep_latest_per_key(listings, |l| dedup_key(l, config))
}

/// Trimmed, lower-cased, fragment-free URL.
pub fn normalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    match lower.find('#') {
        Some(idx) => lower[..idx].to_string(),
        None => lower,
    }
}

/// Identity of a listing for passes 2 and 3.
pub fn dedup_key(listing: &CanonicalListing, config: &DedupConfig) -> String {
    let l = &listing.listing;
    let price = l
        .price
        .map(|p| p.to_bits().to_string())
        .unwrap_or_default();

    match l.url.as_deref().map(normalize_url).filter(|u| !u.is_empty()) {
        Some(url) if config.keep_daily_snapshots => {
            let day = l
                .collected_at
                .map(|ts| ts.date().to_string())
                .unwrap_or_default();
            format!("url\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}", l.marketplace, url, day, price)
        }
        Some(url) => format!("url\u{1f}{}\u{1f}{}", l.marketplace, url),
        None => format!(
            "row\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            l.marketplace,
            normalize(l.seller.as_deref().unwrap_or("")),
            normalize(&l.title),
            price,
            l.source_file
        ),
    }
}

fn remove_exact_duplicates(listings: Vec<CanonicalListing>) -> Vec<CanonicalListing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| seen.insert(fingerprint(l)))
        .collect()
}

fn fingerprint(listing: &CanonicalListing) -> String {
    // Every field, floats in shortest round-trip form.
    serde_json::to_string(listing).unwrap_or_default()
}

fn keep_latest_per_key<F>(listings: Vec<CanonicalListing>, key_of: F) -> Vec<CanonicalListing>
where
    F: Fn(&CanonicalListing) -> String,
{
    let mut winner: HashMap<String, usize> = HashMap::new();
    for (idx, listing) in listings.iter().enumerate() {
        let key = key_of(listing);
        match winner.get(&key) {
            Some(&best) if listings[best].listing.collected_at > listing.listing.collected_at => {}
            _ => {
                winner.insert(key, idx);
            }
        }
    }

    let keep: BTreeSet<usize> = winner.into_values().collect();
    listings
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, listing)| listing)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeyTier, NormalizedListing};
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> Option<chrono::NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 8, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
    }

    fn item(title: &str, url: Option<&str>, price: f64, ts: Option<chrono::NaiveDateTime>) -> CanonicalListing {
        CanonicalListing {
            listing: NormalizedListing {
                marketplace: "ml".into(),
                title: title.into(),
                price: Some(price),
                url: url.map(str::to_string),
                brand_raw: None,
                model_raw: None,
                size_raw: None,
                seller: Some("Loja A".into()),
                sku: None,
                collected_at: ts,
                source_file: "ml/a.csv".into(),
            },
            brand: "dunlop".into(),
            model: "sp touring".into(),
            size: "195/65R15".into(),
            canonical_key: "dunlop|195/65R15|sp touring".into(),
            key_tier: KeyTier::Structured,
        }
    }

    fn cfg() -> DedupConfig {
        DedupConfig::default()
    }

    #[test]
    fn test_exact_duplicates_removed() {
        let a = item("Pneu", Some("https://x/1"), 200.0, at(12, 10));
        let out = dedupe(vec![a.clone(), a.clone(), a], &cfg());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_same_url_keeps_most_recent() {
        let old = item("Pneu v1", Some("https://x/1"), 200.0, at(10, 10));
        let new = item("Pneu v2", Some("HTTPS://X/1#reviews"), 190.0, at(12, 10));
        let out = dedupe(vec![new.clone(), old], &cfg());
        assert_eq!(out, vec![new]);
    }

    #[test]
    fn test_missing_timestamp_is_oldest_and_ties_go_last() {
        let undated = item("a", Some("https://x/1"), 200.0, None);
        let dated = item("b", Some("https://x/1"), 200.0, at(1, 0));
        assert_eq!(dedupe(vec![dated.clone(), undated], &cfg()), vec![dated]);

        let first = item("first", Some("https://x/2"), 200.0, at(5, 5));
        let second = item("second", Some("https://x/2"), 201.0, at(5, 5));
        assert_eq!(dedupe(vec![first, second.clone()], &cfg()), vec![second]);
    }

    #[test]
    fn test_different_marketplaces_do_not_collapse() {
        let a = item("Pneu", Some("https://x/1"), 200.0, at(12, 10));
        let mut b = a.clone();
        b.listing.marketplace = "magalu".into();
        assert_eq!(dedupe(vec![a, b], &cfg()).len(), 2);
    }

    #[test]
    fn test_rows_without_url() {
        let a = item("Pneu Dunlop", None, 200.0, at(10, 0));
        let b = item("PNEU  dunlop", None, 200.0, at(11, 0));
        let c = item("Pneu Dunlop", None, 210.0, at(11, 0));
        let out = dedupe(vec![a, b.clone(), c.clone()], &cfg());
        assert_eq!(out, vec![b, c]);
    }

    #[test]
    fn test_survivors_keep_input_order() {
        let a = item("a", Some("https://x/a"), 1.0, at(1, 0));
        let b = item("b", Some("https://x/b"), 1.0, at(1, 0));
        let c = item("c", Some("https://x/c"), 1.0, at(1, 0));
        let out = dedupe(vec![c.clone(), a.clone(), b.clone()], &cfg());
        assert_eq!(out, vec![c, a, b]);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let input = vec![
            item("a", Some("https://x/1"), 200.0, at(10, 0)),
            item("a", Some("https://x/1"), 195.0, at(11, 0)),
            item("b", None, 180.0, None),
            item("b", None, 180.0, at(3, 0)),
            item("c", Some("https://x/2"), 300.0, None),
        ];
        let once = dedupe(input, &cfg());
        let twice = dedupe(once.clone(), &cfg());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_daily_snapshots_keep_price_history() {
        let config = DedupConfig {
            keep_daily_snapshots: true,
        };
        let input = vec![
            item("a", Some("https://x/1"), 200.0, at(10, 8)),
            item("a", Some("https://x/1"), 200.0, at(10, 20)),
            item("a", Some("https://x/1"), 190.0, at(11, 8)),
        ];
        let out = dedupe(input, &config);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].listing.collected_at, at(10, 20));
        let again = dedupe(out.clone(), &config);
        assert_eq!(out, again);
    }
}
