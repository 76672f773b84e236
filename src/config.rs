//! Configuration parsing.
//!
//! The unifier runs without any configuration file: every section has
//! built-in defaults. A TOML file passed with `--config` overrides them
//! section by section. A `.json` file is accepted as a bare vocabulary
//! document (`known_brands`, `brand_aliases`, `known_model_phrases`,
//! `model_aliases`), which is the format scraper teams already maintain.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Brand / model vocabularies. Turned into an immutable
/// [`Vocabulary`](crate::vocab::Vocabulary) once per run.
#[derive(Debug, Deserialize, Clone)]
pub struct VocabularyConfig {
    #[serde(default = "default_known_brands")]
    pub known_brands: Vec<String>,
    #[serde(default)]
    pub brand_aliases: BTreeMap<String, String>,
    #[serde(default = "default_known_model_phrases")]
    pub known_model_phrases: Vec<String>,
    #[serde(default)]
    pub model_aliases: BTreeMap<String, String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            known_brands: default_known_brands(),
            brand_aliases: BTreeMap::new(),
            known_model_phrases: default_known_model_phrases(),
            model_aliases: BTreeMap::new(),
        }
    }
}

fn default_known_brands() -> Vec<String> {
    [
        "goodyear",
        "pirelli",
        "michelin",
        "dunlop",
        "bridgestone",
        "continental",
        "hankook",
        "bfgoodrich",
        "firestone",
        "kumho",
        "atras",
        "maxxis",
        "formula",
        "yokohama",
        "toyo",
        "nitto",
        "general",
        "cooper",
        "falken",
        "nexen",
        "sumitomo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_known_model_phrases() -> Vec<String> {
    [
        "kelly edge",
        "formula evo",
        "sp touring",
        "assurance maxlife",
        "assurance",
        "maxlife",
        "efficientgrip",
        "wrangler",
        "eagle",
        "energy",
        "direction",
        "kelly",
        "p400 evo",
        "bc20",
        "lm704",
        "enasave ec300",
        "xl tl primacy",
        "primacy 4",
        "f700",
        "sp sport",
        "fm800",
        "eagle sport",
        "p400",
        "energy xm2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Added to the always-on `.git`, `target`, and `node_modules` excludes.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// How many trailing segments of the input directory prefix each
    /// provenance tag (`MercadoLivre/data/raw/lote.csv`).
    #[serde(default = "default_source_tag_segments")]
    pub source_tag_segments: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            source_tag_segments: default_source_tag_segments(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    [
        "**/*.csv",
        "**/*.json",
        "**/*.jsonl",
        "**/*.ndjson",
        "**/*.sqlite",
        "**/*.sqlite3",
        "**/*.db",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_source_tag_segments() -> usize {
    3
}

/// Extra source column names per canonical field, tried before the
/// built-in alias lists.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SchemaConfig {
    #[serde(default)]
    pub column_aliases: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DedupConfig {
    /// Keep one row per URL, collection day, and price instead of only the
    /// latest row per URL.
    #[serde(default)]
    pub keep_daily_snapshots: bool,
}

impl Config {
    /// Built-in defaults, used when no `--config` is given.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let config = if is_json {
        let vocabulary: VocabularyConfig = serde_json::from_str(&content)
            .with_context(|| "Failed to parse vocabulary JSON document")?;
        Config {
            vocabulary,
            ..Config::default()
        }
    } else {
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    };

    validate(&config)?;
    Ok(config)
}

/// Load `path` when given, otherwise fall back to the built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => Ok(Config::minimal()),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.discovery.include_globs.is_empty() {
        bail!("discovery.include_globs must not be empty");
    }

    if config.discovery.source_tag_segments > 16 {
        bail!("discovery.source_tag_segments must be <= 16");
    }

    for field in config.schema.column_aliases.keys() {
        if !crate::schema::CANONICAL_FIELDS.contains(&field.as_str()) {
            bail!(
                "Unknown field in schema.column_aliases: '{}'. Must be one of: {}",
                field,
                crate::schema::CANONICAL_FIELDS.join(", ")
            );
        }
    }

    for (alias, target) in &config.vocabulary.brand_aliases {
        if target.trim().is_empty() {
            bail!("vocabulary.brand_aliases['{}'] maps to an empty brand", alias);
        }
    }

    Ok(())
}
