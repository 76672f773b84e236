//! # Tire Unifier
//!
//! Unifies tire listings scraped from several marketplaces into one
//! queryable catalog.
//!
//! Scrapers write CSV, JSON, and SQLite files with their own column names
//! and their own way of spelling the same tire. The unifier maps every
//! record onto one schema, extracts brand, model, and size from free text,
//! gives each physical product a stable key, removes duplicate listings,
//! and summarizes prices per product.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │  discover   │──▶│   readers    │──▶│    schema    │──▶│ canonical│
//! │ walk+globs  │   │ CSV/JSON/SQL │   │ alias tables │   │ key, tier│
//! └─────────────┘   └──────────────┘   └──────────────┘   └────┬─────┘
//!                                                              ▼
//!                   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//!                   │   persist    │◀──│  aggregate   │◀──│  dedup   │
//!                   │ SQLite/parts │   │ price stats  │   │          │
//!                   └──────────────┘   └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tire-unify unify --input scrapes/ml scrapes/magalu --output out/catalog.sqlite
//! tire-unify unify --input scrapes --output out/parts --split-by brand,size
//! tire-unify stats --db out/catalog.sqlite
//! tire-unify audit --db out/catalog.sqlite
//! tire-unify export --db out/catalog.sqlite --table summary --format csv
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`text`] | Comparison-form text folding |
//! | [`vocab`] | Immutable brand/model vocabulary |
//! | [`extract`] | Size, brand, and model extractors |
//! | [`key`] | Canonical keys and product ids |
//! | [`schema`] | Column aliases, price and timestamp parsing |
//! | [`discover`] | Input file discovery |
//! | [`readers`] | CSV, JSON, and SQLite readers |
//! | [`traits`] | `SourceReader` / `ListingAdapter` extension points |
//! | [`canonical`] | Canonicalization and filters |
//! | [`dedup`] | Listing deduplication |
//! | [`aggregate`] | Per-product price summaries |
//! | [`pipeline`] | Unify run orchestration |
//! | [`persist`] | Output store writing and partitioning |
//! | [`db`] | Database connection |
//! | [`migrate`] | Output schema |
//! | [`stats`], [`audit`], [`export`] | Reporting over an output store |

pub mod aggregate;
pub mod audit;
pub mod canonical;
pub mod config;
pub mod db;
pub mod dedup;
pub mod discover;
pub mod error;
pub mod export;
pub mod extract;
pub mod key;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod readers;
pub mod schema;
pub mod stats;
pub mod text;
pub mod traits;
pub mod vocab;
