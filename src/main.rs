//! # Tire Unifier CLI (`tire-unify`)
//!
//! The `tire-unify` binary turns directories of scraped marketplace files
//! into one SQLite catalog and inspects the result.
//!
//! ## Usage
//!
//! ```bash
//! tire-unify [--config ./unifier.toml] [--log-level debug] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tire-unify unify` | Discover, canonicalize, dedupe, and persist listings |
//! | `tire-unify stats` | Row counts and per-marketplace breakdown of a store |
//! | `tire-unify audit` | Missing-value report of a store |
//! | `tire-unify export` | Dump a store table as JSON or CSV |
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Any other failure (I/O, config, persistence) |
//! | 2 | No input files, or no loadable records |
//! | 3 | Every listing excluded by the filters |
//! | 4 | Invalid `--split-by` or partition output path |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tire_unifier::config;
use tire_unifier::error::exit_code_for;
use tire_unifier::export::{self, ExportFormat, ExportTable};
use tire_unifier::logging;
use tire_unifier::pipeline::{self, UnifyOptions};
use tire_unifier::{audit, stats};

/// Tire Unifier: canonical identity, dedup, and price aggregates for
/// scraped tire listings.
#[derive(Parser)]
#[command(
    name = "tire-unify",
    about = "Unify scraped tire marketplace listings into one SQLite catalog",
    version,
    long_about = "Reads CSV, JSON/NDJSON, and SQLite scrape outputs from several marketplaces, \
    maps them onto one listing schema, derives a canonical brand/model/size key per product, \
    removes duplicate listings, and writes per-product price summaries."
)]
struct Cli {
    /// Path to a configuration file (TOML, or a JSON vocabulary document).
    ///
    /// Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (`info`, `debug`, `tire_unifier=trace`). Overrides `TIRE_UNIFY_LOG`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unify listings from one or more input directories.
    ///
    /// Writes `unified_listings` and `canonical_summary` to the output
    /// SQLite file, or one file per partition with `--split-by`.
    Unify {
        /// Input directories (or single files) to scan.
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output SQLite file, or output directory with `--split-by`.
        #[arg(long)]
        output: PathBuf,

        /// Keep only listings of this brand (aliases accepted).
        #[arg(long)]
        only_brand: Option<String>,

        /// Keep only listings of this size (`195/65R15`, `195 65 r15`).
        #[arg(long)]
        only_size: Option<String>,

        /// Keep only listings of this model.
        #[arg(long)]
        only_model: Option<String>,

        /// Append to existing tables instead of replacing them.
        #[arg(long)]
        append: bool,

        /// Write one store per distinct combination of these attributes
        /// (comma-separated subset of `brand,size,model`).
        #[arg(long)]
        split_by: Option<String>,
    },

    /// Show store statistics.
    Stats {
        /// Output store to inspect.
        #[arg(long)]
        db: PathBuf,
    },

    /// Report missing values per column and per marketplace.
    Audit {
        /// Output store to inspect.
        #[arg(long)]
        db: PathBuf,
    },

    /// Export a store table.
    Export {
        /// Output store to read.
        #[arg(long)]
        db: PathBuf,

        #[arg(long, value_enum, default_value = "listings")]
        table: ExportTable,

        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Destination file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_level.as_deref());

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(exit_code_for(&e));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Unify {
            input,
            output,
            only_brand,
            only_size,
            only_model,
            append,
            split_by,
        } => {
            let opts = UnifyOptions {
                inputs: input,
                output,
                only_brand,
                only_size,
                only_model,
                append,
                split_by,
            };
            pipeline::run_unify(&cfg, &opts).await?;
        }
        Commands::Stats { db } => {
            stats::run_stats(&db).await?;
        }
        Commands::Audit { db } => {
            audit::run_audit(&db).await?;
        }
        Commands::Export {
            db,
            table,
            format,
            output,
        } => {
            export::run_export(&db, table, format, output.as_deref()).await?;
        }
    }

    Ok(())
}
