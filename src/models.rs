//! Core data models used throughout the unifier.
//!
//! These types represent the records that flow through the pipeline:
//! loosely-typed raw tables straight from a reader, fixed-schema normalized
//! listings, canonical listings carrying an identity key, and per-key
//! summaries.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Timestamp format used for every persisted `collected_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell value as read from CSV, JSON, or SQLite.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawValue {
    /// Text view of the value; `None` for nulls and blank strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Float(f) if f.is_finite() => Some(f.to_string()),
            RawValue::Float(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_text().is_none()
    }
}

/// One source row keyed by lower-cased column name.
pub type RawRecord = BTreeMap<String, RawValue>;

/// Everything one reader produced for one file (or one SQLite table).
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Provenance tag, e.g. `MercadoLivre/data/raw/lote.csv`.
    pub source_file: String,
    /// SQLite table name; `None` for CSV/JSON.
    pub table: Option<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(source_file: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            source_file: source_file.into(),
            table: None,
            records,
        }
    }

    /// Column names seen in any record (lower-cased).
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect();
        cols.sort();
        cols.dedup();
        cols
    }
}

/// Fixed-schema listing produced by the schema normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedListing {
    pub marketplace: String,
    pub title: String,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub brand_raw: Option<String>,
    pub model_raw: Option<String>,
    pub size_raw: Option<String>,
    pub seller: Option<String>,
    pub sku: Option<String>,
    pub collected_at: Option<NaiveDateTime>,
    pub source_file: String,
}

/// Which tier of [`build_key`](crate::key::build_key) produced a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyTier {
    Structured,
    Fallback,
}

impl KeyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyTier::Structured => "structured",
            KeyTier::Fallback => "fallback",
        }
    }
}

/// Normalized listing plus derived identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalListing {
    #[serde(flatten)]
    pub listing: NormalizedListing,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub canonical_key: String,
    pub key_tier: KeyTier,
}

impl CanonicalListing {
    pub fn collected_at_str(&self) -> Option<String> {
        self.listing
            .collected_at
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
    }
}

/// Group-level price statistics for one canonical key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalSummary {
    pub canonical_key: String,
    pub product_id: String,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub n_listings: usize,
    pub marketplaces: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub mean_price: Option<f64>,
    pub median_price: Option<f64>,
    pub p10: Option<f64>,
    pub p90: Option<f64>,
    pub trimmed_mean: Option<f64>,
    pub evidence_files: Vec<String>,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
}
