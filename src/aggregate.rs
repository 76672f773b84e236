//! Per-product price summaries.
//!
//! Listings are grouped by canonical key. Each group gets min, max, mean,
//! and median price, the 10th/90th percentiles, and a trimmed mean over
//! the prices inside `[p10, p90]`. Percentiles use linear interpolation
//! between closest ranks. Prices are sorted before any arithmetic so the
//! output does not depend on input order.

use std::collections::{BTreeMap, BTreeSet};

use crate::key::product_id;
use crate::models::{CanonicalListing, CanonicalSummary};

pub fn summarize(listings: &[CanonicalListing]) -> Vec<CanonicalSummary> {
    let mut ordered: Vec<&CanonicalListing> = listings.iter().collect();
    ordered.sort_by(|a, b| {
        a.canonical_key
            .cmp(&b.canonical_key)
            .then_with(|| a.brand.cmp(&b.brand))
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.size.cmp(&b.size))
    });

    let mut groups: BTreeMap<&str, Vec<&CanonicalListing>> = BTreeMap::new();
    for listing in ordered {
        groups
            .entry(listing.canonical_key.as_str())
            .or_default()
            .push(listing);
    }

    let mut summaries: Vec<CanonicalSummary> = groups
        .into_iter()
        .map(|(key, group)| summarize_group(key, &group))
        .collect();

    summaries.sort_by(|a, b| {
        a.brand
            .cmp(&b.brand)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.size.cmp(&b.size))
            .then_with(|| b.n_listings.cmp(&a.n_listings))
            .then_with(|| a.canonical_key.cmp(&b.canonical_key))
    });
    summaries
}

fn summarize_group(key: &str, group: &[&CanonicalListing]) -> CanonicalSummary {
    let head = group[0];

    let mut prices: Vec<f64> = group
        .iter()
        .filter_map(|l| l.listing.price)
        .filter(|p| p.is_finite())
        .collect();
    prices.sort_by(|a, b| a.total_cmp(b));

    let marketplaces: BTreeSet<&str> = group
        .iter()
        .map(|l| l.listing.marketplace.as_str())
        .filter(|m| !m.is_empty())
        .collect();
    let evidence: BTreeSet<&str> = group
        .iter()
        .map(|l| l.listing.source_file.as_str())
        .filter(|f| !f.is_empty())
        .collect();

    let seen = group.iter().filter_map(|l| l.listing.collected_at);
    let first_seen = seen.clone().min();
    let last_seen = seen.max();

    let p10 = quantile(&prices, 0.10);
    let p90 = quantile(&prices, 0.90);
    let trimmed_mean = match (p10, p90) {
        (Some(lo), Some(hi)) => {
            let inside: Vec<f64> = prices
                .iter()
                .copied()
                .filter(|p| *p >= lo && *p <= hi)
                .collect();
            mean(&inside).map(|m| m.clamp(lo, hi))
        }
        _ => None,
    };

    CanonicalSummary {
        canonical_key: key.to_string(),
        product_id: product_id(key),
        brand: head.brand.clone(),
        model: head.model.clone(),
        size: head.size.clone(),
        n_listings: group.len(),
        marketplaces: marketplaces.into_iter().map(str::to_string).collect(),
        min_price: prices.first().copied(),
        max_price: prices.last().copied(),
        mean_price: match (prices.first(), prices.last()) {
            (Some(&lo), Some(&hi)) => mean(&prices).map(|m| m.clamp(lo, hi)),
            _ => None,
        },
        median_price: quantile(&prices, 0.5),
        p10,
        p90,
        trimmed_mean,
        evidence_files: evidence.into_iter().map(str::to_string).collect(),
        first_seen,
        last_seen,
    }
}

/// Plain arithmetic mean. Rounding can land it just outside the range of
/// the inputs, so callers clamp.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Quantile `q` of ascending `sorted`, interpolating linearly between the
/// two closest ranks. `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}
