//! Schema normalization: arbitrary source columns → [`NormalizedListing`].
//!
//! Every source (site, scraper version, export tool) names its columns
//! differently. For each canonical field an ordered list of known column
//! names is tried and the first present, non-blank value wins. Missing
//! columns are not an error; the field is simply `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::config::SchemaConfig;
use crate::models::{NormalizedListing, RawRecord, RawTable, RawValue};

/// Canonical fields that accept column aliases.
pub const CANONICAL_FIELDS: &[&str] = &[
    "marketplace",
    "title",
    "price",
    "url",
    "brand_raw",
    "model_raw",
    "size_raw",
    "seller",
    "sku",
    "collected_at",
];

fn builtin_aliases(field: &str) -> &'static [&'static str] {
    match field {
        "marketplace" => &["marketplace", "site", "canal", "loja_origem"],
        "title" => &["title", "titulo", "nome", "produto", "product_title", "name"],
        "price" => &["price", "preco", "valor", "amount", "valor_preco", "preco_final"],
        "url" => &["url", "link", "href", "product_url", "page_url", "request_url"],
        "brand_raw" => &["brand_raw", "brand", "marca", "marca_prod", "marca_produto"],
        "model_raw" => &[
            "model_raw",
            "model",
            "modelo",
            "modelo_prod",
            "linha",
            "linha_modelo",
            "marca_filho",
        ],
        "size_raw" => &["size_raw", "size", "tamanho", "medida", "medidas", "medida_norm"],
        "seller" => &["seller", "vendedor", "loja", "store", "seller_name", "store_name"],
        "sku" => &["sku", "sku_norm", "codigo", "product_id", "item_id"],
        "collected_at" => &[
            "collected_at",
            "data_coleta",
            "coletado_em",
            "capturado_em",
            "scrape_date",
            "scraped_at",
            "captured_at",
            "data",
        ],
        _ => &[],
    }
}

/// Resolved alias lists: configured extras first, then the built-ins.
#[derive(Debug, Clone)]
pub struct ColumnAliases {
    by_field: BTreeMap<&'static str, Vec<String>>,
}

impl ColumnAliases {
    pub fn from_config(config: &SchemaConfig) -> Self {
        let mut by_field = BTreeMap::new();
        for field in CANONICAL_FIELDS {
            let mut names: Vec<String> = config
                .column_aliases
                .get(*field)
                .map(|extra| extra.iter().map(|n| n.trim().to_lowercase()).collect())
                .unwrap_or_default();
            for builtin in builtin_aliases(field) {
                if !names.iter().any(|n| n == builtin) {
                    names.push(builtin.to_string());
                }
            }
            by_field.insert(*field, names);
        }
        Self { by_field }
    }

    pub fn names(&self, field: &str) -> &[String] {
        self.by_field.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self::from_config(&SchemaConfig::default())
    }
}

/// First non-blank value among `names` in `record`.
pub fn pick<'a>(record: &'a RawRecord, names: &[String]) -> Option<&'a RawValue> {
    names
        .iter()
        .filter_map(|name| record.get(name))
        .find(|value| !value.is_blank())
}

/// Normalize every record of `table`. Records with neither a title nor a
/// URL carry no signal and are left out.
pub fn normalize_schema(table: &RawTable, aliases: &ColumnAliases) -> Vec<NormalizedListing> {
    table
        .records
        .iter()
        .filter_map(|record| normalize_record(record, &table.source_file, aliases))
        .collect()
}

/// Normalize one record; `None` when it has neither title nor URL.
pub fn normalize_record(
    record: &RawRecord,
    source_file: &str,
    aliases: &ColumnAliases,
) -> Option<NormalizedListing> {
    let text = |field: &str| pick(record, aliases.names(field)).and_then(RawValue::as_text);

    let title = text("title").unwrap_or_default();
    let url = text("url");
    if title.is_empty() && url.is_none() {
        return None;
    }

    let marketplace = text("marketplace")
        .map(|m| m.to_lowercase())
        .or_else(|| url.as_deref().and_then(marketplace_from_url))
        .unwrap_or_default();

    Some(NormalizedListing {
        marketplace,
        title,
        price: pick(record, aliases.names("price")).and_then(parse_price),
        url,
        brand_raw: text("brand_raw"),
        model_raw: text("model_raw"),
        size_raw: text("size_raw"),
        seller: text("seller"),
        sku: text("sku"),
        collected_at: pick(record, aliases.names("collected_at")).and_then(parse_timestamp),
        source_file: source_file.to_string(),
    })
}

/// Parse a price from a number or from text such as `R$ 1.234,56`,
/// `1,234.56`, or `199,90`. The last separator decides which one is the
/// decimal mark when both appear. Negative and non-finite values are
/// rejected.
pub fn parse_price(value: &RawValue) -> Option<f64> {
    let parsed = match value {
        RawValue::Null => None,
        RawValue::Integer(i) => Some(*i as f64),
        RawValue::Float(f) => Some(*f),
        RawValue::Text(s) => parse_price_text(s),
    };
    parsed.filter(|p| p.is_finite() && *p >= 0.0)
}

fn parse_price_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    canonical.parse::<f64>().ok()
}

/// Parse a collection timestamp. Accepts RFC 3339, ISO date-times with or
/// without `T`, bare dates, Brazilian `DD/MM/YYYY` forms, and epoch
/// seconds (or milliseconds). Time zones are converted to UTC and dropped.
pub fn parse_timestamp(value: &RawValue) -> Option<NaiveDateTime> {
    match value {
        RawValue::Null => None,
        RawValue::Integer(i) => from_epoch(*i),
        RawValue::Float(f) if f.is_finite() => from_epoch(*f as i64),
        RawValue::Float(_) => None,
        RawValue::Text(s) => parse_timestamp_text(s.trim()),
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

fn parse_timestamp_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(from_epoch);
    }
    None
}

fn from_epoch(value: i64) -> Option<NaiveDateTime> {
    // Values this large are milliseconds.
    let secs = if value.abs() >= 100_000_000_000 {
        value / 1000
    } else {
        value
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Host prefixes that name a section of a site rather than the site.
const GENERIC_HOST_LABELS: &[&str] = &["www", "m", "produto", "produtos", "lista", "loja", "shop", "store"];

/// Marketplace label from a listing URL: the first meaningful host label
/// (`https://produto.mercadolivre.com.br/x` → `mercadolivre`).
pub fn marketplace_from_url(url: &str) -> Option<String> {
    let lower = url.trim().to_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))?;
    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let mut idx = 0;
    while idx + 1 < labels.len() && GENERIC_HOST_LABELS.contains(&labels[idx]) {
        idx += 1;
    }

    labels
        .get(idx)
        .filter(|label| label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        .map(|label| label.to_string())
}
