//! Extension traits for source readers and listing adapters.
//!
//! Two seams let callers plug in source-specific behavior without touching
//! the pipeline:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             ReaderRegistry               │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐  │
//! │  │  CSV    │ │JSON/NDJ │ │  SQLite    │  │  + custom (Rust)
//! │  └─────────┘ └─────────┘ └────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼  RawTable
//! ┌──────────────────────────────────────────┐
//! │             AdapterRegistry              │
//! │  custom adapters ... → ColumnAliasAdapter│
//! └──────────────┬───────────────────────────┘
//!                ▼  NormalizedListing
//!          canonicalize → dedupe → summarize
//! ```
//!
//! # Usage
//!
//! ```rust
//! use tire_unifier::traits::{AdapterRegistry, ReaderRegistry};
//!
//! let readers = ReaderRegistry::with_builtins();
//! let mut adapters = AdapterRegistry::default();
//! // adapters.register(Box::new(MyScraperAdapter));
//! # let _ = (readers, adapters);
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::discover::DiscoveredFile;
use crate::models::{NormalizedListing, RawRecord, RawTable};
use crate::readers::{CsvReader, JsonReader, SqliteReader};
use crate::schema::{normalize_record, ColumnAliases};

// ═══════════════════════════════════════════════════════════════════════
// SourceReader
// ═══════════════════════════════════════════════════════════════════════

/// Turns one discovered file into zero or more raw tables.
///
/// A reader claims files through [`handles`](SourceReader::handles),
/// usually by extension. Errors are per file: the pipeline logs them and
/// moves on to the next file.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use std::path::Path;
/// use tire_unifier::discover::DiscoveredFile;
/// use tire_unifier::models::RawTable;
/// use tire_unifier::traits::SourceReader;
///
/// pub struct TsvReader;
///
/// #[async_trait]
/// impl SourceReader for TsvReader {
///     fn name(&self) -> &str { "tsv" }
///     fn handles(&self, path: &Path) -> bool {
///         path.extension().map(|e| e == "tsv").unwrap_or(false)
///     }
///     async fn read(&self, file: &DiscoveredFile) -> Result<Vec<RawTable>> {
///         Ok(vec![RawTable::new(file.source_tag.clone(), vec![])])
///     }
/// }
/// ```
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Short identifier used in log events (`"csv"`, `"sqlite"`).
    fn name(&self) -> &str;

    /// Whether this reader understands `path`.
    fn handles(&self, path: &Path) -> bool;

    /// Read every table in the file. Each table's `source_file` should be
    /// the file's provenance tag.
    async fn read(&self, file: &DiscoveredFile) -> Result<Vec<RawTable>>;
}

/// Lower-cased extension of `path`, or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════
// ListingAdapter
// ═══════════════════════════════════════════════════════════════════════

/// Maps the records of one kind of source table to [`NormalizedListing`]s.
///
/// Use this for scrapers whose output cannot be described by column
/// aliases alone, e.g. a price split across two columns.
pub trait ListingAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this adapter should handle `table`. Typically decided from
    /// [`RawTable::columns`] or the provenance tag.
    fn accepts(&self, table: &RawTable) -> bool;

    /// Normalize one record. `None` drops it.
    fn normalize(&self, record: &RawRecord, source_file: &str) -> Option<NormalizedListing>;
}

/// Built-in adapter driven by the column alias table. Accepts every table.
pub struct ColumnAliasAdapter {
    aliases: ColumnAliases,
}

impl ColumnAliasAdapter {
    pub fn new(aliases: ColumnAliases) -> Self {
        Self { aliases }
    }
}

impl ListingAdapter for ColumnAliasAdapter {
    fn name(&self) -> &str {
        "column_alias"
    }

    fn accepts(&self, _table: &RawTable) -> bool {
        true
    }

    fn normalize(&self, record: &RawRecord, source_file: &str) -> Option<NormalizedListing> {
        normalize_record(record, source_file, &self.aliases)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registries
// ═══════════════════════════════════════════════════════════════════════

/// Ordered set of readers; the first reader that handles a path wins.
pub struct ReaderRegistry {
    readers: Vec<Box<dyn SourceReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    /// Registry with the CSV, JSON/NDJSON, and SQLite readers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CsvReader));
        registry.register(Box::new(JsonReader));
        registry.register(Box::new(SqliteReader));
        registry
    }

    pub fn register(&mut self, reader: Box<dyn SourceReader>) {
        self.readers.push(reader);
    }

    pub fn find(&self, path: &Path) -> Option<&dyn SourceReader> {
        self.readers
            .iter()
            .find(|r| r.handles(path))
            .map(|r| r.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Custom adapters in registration order, then the column alias fallback.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn ListingAdapter>>,
    fallback: ColumnAliasAdapter,
}

impl AdapterRegistry {
    pub fn new(aliases: ColumnAliases) -> Self {
        Self {
            adapters: Vec::new(),
            fallback: ColumnAliasAdapter::new(aliases),
        }
    }

    pub fn register(&mut self, adapter: Box<dyn ListingAdapter>) {
        self.adapters.push(adapter);
    }

    /// The adapter responsible for `table`.
    pub fn adapter_for(&self, table: &RawTable) -> &dyn ListingAdapter {
        self.adapters
            .iter()
            .find(|a| a.accepts(table))
            .map(|a| a.as_ref())
            .unwrap_or(&self.fallback as &dyn ListingAdapter)
    }

    /// Normalize every record of `table` with its adapter.
    pub fn normalize_table(&self, table: &RawTable) -> Vec<NormalizedListing> {
        let adapter = self.adapter_for(table);
        table
            .records
            .iter()
            .filter_map(|record| adapter.normalize(record, &table.source_file))
            .collect()
    }

    /// Number of custom adapters (the fallback is not counted).
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(ColumnAliases::default())
    }
}
