//! Unify pipeline orchestration.
//!
//! Stages run strictly in order, each finishing before the next starts:
//!
//! ```text
//! DISCOVER → LOAD → NORMALIZE_SCHEMA → CANONICALIZE → FILTER → DEDUPE
//!          → AGGREGATE → PERSIST (one store, or one per partition)
//! ```
//!
//! Per-file problems are logged and counted; only the conditions in
//! [`UnifyError`] stop a run, and they are all detected before anything is
//! written.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::aggregate::summarize;
use crate::canonical::{canonicalize_all, Filters};
use crate::config::Config;
use crate::dedup::dedupe;
use crate::discover::{discover, DiscoveredFile};
use crate::error::UnifyError;
use crate::models::{CanonicalListing, KeyTier, NormalizedListing, RawTable};
use crate::persist::{
    check_partition_dir, parse_split_by, partition, remove_stale_partitions, write_store, RunInfo,
    WriteMode,
};
use crate::schema::ColumnAliases;
use crate::traits::{AdapterRegistry, ListingAdapter, ReaderRegistry, SourceReader};
use crate::vocab::Vocabulary;

/// Arguments of one `unify` run.
#[derive(Debug, Clone, Default)]
pub struct UnifyOptions {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub only_brand: Option<String>,
    pub only_size: Option<String>,
    pub only_model: Option<String>,
    pub append: bool,
    /// Comma-separated partition attributes (`brand,size`).
    pub split_by: Option<String>,
}

/// Counters and outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct UnifyReport {
    pub run_id: String,
    pub files_discovered: usize,
    pub files_failed: usize,
    pub tables_loaded: usize,
    pub records_loaded: usize,
    /// Records with neither title nor URL.
    pub records_dropped: usize,
    pub filtered_out: usize,
    pub duplicates_removed: usize,
    pub listings: usize,
    pub fallback_keys: usize,
    pub products: usize,
    pub outputs: Vec<PathBuf>,
    pub listings_written: u64,
    pub summaries_written: u64,
}

/// Canonical listings ready to persist, plus the counters gathered so far.
#[derive(Debug, Default)]
pub struct Unified {
    pub listings: Vec<CanonicalListing>,
    pub report: UnifyReport,
}

/// The unifier with its vocabulary, readers, and adapters.
pub struct Unifier {
    config: Config,
    vocab: Vocabulary,
    readers: ReaderRegistry,
    adapters: AdapterRegistry,
}

impl Unifier {
    pub fn new(config: Config) -> Self {
        let vocab = Vocabulary::from_config(&config.vocabulary);
        let adapters = AdapterRegistry::new(ColumnAliases::from_config(&config.schema));
        Self {
            config,
            vocab,
            readers: ReaderRegistry::with_builtins(),
            adapters,
        }
    }

    /// Add a reader; it is consulted after the built-in ones.
    pub fn register_reader(&mut self, reader: Box<dyn SourceReader>) {
        self.readers.register(reader);
    }

    /// Add an adapter; custom adapters are consulted before the column
    /// alias fallback, in registration order.
    pub fn register_adapter(&mut self, adapter: Box<dyn ListingAdapter>) {
        self.adapters.register(adapter);
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Run DISCOVER through DEDUPE without writing anything.
    pub async fn unify(&self, opts: &UnifyOptions) -> Result<Unified> {
        let mut report = UnifyReport::default();

        let discovery = discover(&opts.inputs, &self.config.discovery)?;
        report.files_discovered = discovery.files.len();
        info!(files = discovery.files.len(), "discover finished");
        if discovery.files.is_empty() {
            return Err(UnifyError::NoInputFiles.into());
        }

        let tables = self.load(&discovery.files, &mut report).await;

        let mut normalized: Vec<NormalizedListing> = Vec::new();
        for table in &tables {
            report.records_loaded += table.records.len();
            let listings = self.adapters.normalize_table(table);
            report.records_dropped += table.records.len().saturating_sub(listings.len());
            normalized.extend(listings);
        }
        info!(
            records = report.records_loaded,
            listings = normalized.len(),
            dropped = report.records_dropped,
            "schema normalization finished"
        );
        if normalized.is_empty() {
            return Err(UnifyError::NoRecords {
                files: report.files_discovered,
            }
            .into());
        }

        let canonical = canonicalize_all(normalized, &self.vocab);

        let filters = Filters::new(
            opts.only_brand.as_deref(),
            opts.only_size.as_deref(),
            opts.only_model.as_deref(),
            &self.vocab,
        );
        let before_filter = canonical.len();
        let filtered = filters.apply(canonical);
        report.filtered_out = before_filter - filtered.len();
        if filtered.is_empty() {
            return Err(UnifyError::FilteredOut {
                filters: filters.describe(),
            }
            .into());
        }

        let before_dedup = filtered.len();
        let listings = dedupe(filtered, &self.config.dedup);
        report.duplicates_removed = before_dedup - listings.len();
        report.listings = listings.len();
        report.fallback_keys = listings
            .iter()
            .filter(|l| l.key_tier == KeyTier::Fallback)
            .count();
        info!(
            listings = report.listings,
            duplicates = report.duplicates_removed,
            fallback_keys = report.fallback_keys,
            "canonicalize and dedupe finished"
        );

        Ok(Unified { listings, report })
    }

    async fn load(&self, files: &[DiscoveredFile], report: &mut UnifyReport) -> Vec<RawTable> {
        let mut tables = Vec::new();
        for file in files {
            let Some(reader) = self.readers.find(&file.path) else {
                warn!(file = %file.source_tag, "no reader for file, skipping");
                report.files_failed += 1;
                continue;
            };
            match reader.read(file).await {
                Ok(read) => {
                    debug!(
                        file = %file.source_tag,
                        reader = reader.name(),
                        tables = read.len(),
                        "loaded file"
                    );
                    report.tables_loaded += read.len();
                    tables.extend(read);
                }
                Err(e) => {
                    warn!(file = %file.source_tag, error = %format!("{:#}", e), "failed to read file, skipping");
                    report.files_failed += 1;
                }
            }
        }
        tables
    }

    /// Full run: validate the output target, unify, aggregate, persist.
    pub async fn run(&self, opts: &UnifyOptions) -> Result<UnifyReport> {
        let split_by = match opts.split_by.as_deref() {
            Some(spec) => {
                let attrs = parse_split_by(spec)?;
                check_partition_dir(&opts.output)?;
                Some(attrs)
            }
            None => None,
        };

        let Unified { listings, mut report } = self.unify(opts).await?;

        let mode = if opts.append {
            WriteMode::Append
        } else {
            WriteMode::Replace
        };
        let run = RunInfo::new();
        report.run_id = run.run_id.clone();

        match split_by {
            None => {
                let summaries = summarize(&listings);
                report.products = summaries.len();
                let written = write_store(&opts.output, &listings, &summaries, mode, &run).await?;
                report.listings_written = written.listings_written;
                report.summaries_written = written.summaries_written;
                report.outputs.push(opts.output.clone());
            }
            Some(attrs) => {
                std::fs::create_dir_all(&opts.output)?;
                for (file_name, group) in partition(&listings, &attrs) {
                    let group: Vec<CanonicalListing> = group.into_iter().cloned().collect();
                    let summaries = summarize(&group);
                    report.products += summaries.len();
                    let path = opts.output.join(&file_name);
                    let written = write_store(&path, &group, &summaries, mode, &run).await?;
                    debug!(partition = %file_name, listings = group.len(), "wrote partition");
                    report.listings_written += written.listings_written;
                    report.summaries_written += written.summaries_written;
                    report.outputs.push(path);
                }
                if mode == WriteMode::Replace {
                    let removed = remove_stale_partitions(&opts.output, &report.outputs)?;
                    if removed > 0 {
                        info!(removed, "removed partitions from earlier runs");
                    }
                }
            }
        }

        info!(
            outputs = report.outputs.len(),
            products = report.products,
            run_id = %report.run_id,
            "persist finished"
        );
        Ok(report)
    }
}

/// CLI entry point for `unify`: run and print the report.
pub async fn run_unify(config: &Config, opts: &UnifyOptions) -> Result<()> {
    let unifier = Unifier::new(config.clone());
    let report = unifier.run(opts).await?;
    print_report(&report, opts);
    Ok(())
}

fn print_report(report: &UnifyReport, opts: &UnifyOptions) {
    println!("unify {} input(s)", opts.inputs.len());
    println!("  files discovered: {}", report.files_discovered);
    if report.files_failed > 0 {
        println!("  files skipped: {}", report.files_failed);
    }
    println!("  records loaded: {}", report.records_loaded);
    if report.records_dropped > 0 {
        println!("  records without title or url: {}", report.records_dropped);
    }
    if report.filtered_out > 0 {
        println!("  filtered out: {}", report.filtered_out);
    }
    println!("  duplicates removed: {}", report.duplicates_removed);
    println!(
        "  listings: {} ({} with fallback keys)",
        report.listings, report.fallback_keys
    );
    println!("  products: {}", report.products);
    println!(
        "  written: {} listings, {} summaries ({})",
        report.listings_written,
        report.summaries_written,
        if opts.append { "append" } else { "replace" }
    );
    for output in &report.outputs {
        println!("  -> {}", output.display());
    }
    println!("ok");
}
