//! Writing listings and summaries to SQLite, whole or partitioned.
//!
//! `replace` drops and recreates both tables inside one transaction, so a
//! failed run leaves the previous contents untouched. `append` keeps
//! existing rows: listings are keyed by a content hash and inserted with
//! `INSERT OR IGNORE`, summaries are tagged with the run that produced them.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::db;
use crate::error::UnifyError;
use crate::key::product_id;
use crate::migrate::{create_output_tables, drop_output_tables};
use crate::models::{CanonicalListing, CanonicalSummary, TIMESTAMP_FORMAT};
use crate::text::safe_part;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Replace,
    Append,
}

/// Identity of one unify run, stamped on every summary row it writes.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: String,
    pub computed_at: String,
}

impl RunInfo {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            computed_at: chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Listing rows actually inserted (append skips rows already present).
    pub listings_written: u64,
    pub summaries_written: u64,
}

/// Content hash of a listing row; identical rows share an id.
pub fn listing_id(listing: &CanonicalListing) -> String {
    let l = &listing.listing;
    let fields = [
        l.marketplace.clone(),
        l.title.clone(),
        l.price.map(|p| p.to_string()).unwrap_or_default(),
        l.url.clone().unwrap_or_default(),
        l.brand_raw.clone().unwrap_or_default(),
        l.model_raw.clone().unwrap_or_default(),
        l.size_raw.clone().unwrap_or_default(),
        l.seller.clone().unwrap_or_default(),
        l.sku.clone().unwrap_or_default(),
        listing.collected_at_str().unwrap_or_default(),
        l.source_file.clone(),
        listing.canonical_key.clone(),
    ];

    let mut hasher = Sha256::new();
    for field in &fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}

/// Write one output store.
pub async fn write_store(
    path: &Path,
    listings: &[CanonicalListing],
    summaries: &[CanonicalSummary],
    mode: WriteMode,
    run: &RunInfo,
) -> Result<WriteReport> {
    let pool = db::connect(path).await?;
    let mut tx = pool.begin().await?;

    if mode == WriteMode::Replace {
        drop_output_tables(&mut *tx).await?;
    }
    create_output_tables(&mut *tx).await?;

    let mut report = WriteReport::default();

    for listing in listings {
        let l = &listing.listing;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO unified_listings (
                listing_id, marketplace, title, price, url, brand_raw, model_raw,
                size_raw, seller, sku, collected_at, source_file, brand, model,
                size, canonical_key, key_tier, product_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing_id(listing))
        .bind(&l.marketplace)
        .bind(&l.title)
        .bind(l.price)
        .bind(&l.url)
        .bind(&l.brand_raw)
        .bind(&l.model_raw)
        .bind(&l.size_raw)
        .bind(&l.seller)
        .bind(&l.sku)
        .bind(listing.collected_at_str())
        .bind(&l.source_file)
        .bind(&listing.brand)
        .bind(&listing.model)
        .bind(&listing.size)
        .bind(&listing.canonical_key)
        .bind(listing.key_tier.as_str())
        .bind(product_id(&listing.canonical_key))
        .execute(&mut *tx)
        .await?;
        report.listings_written += result.rows_affected();
    }

    for s in summaries {
        sqlx::query(
            r#"
            INSERT INTO canonical_summary (
                run_id, computed_at, canonical_key, product_id, brand, model, size,
                n_listings, marketplaces, min_price, max_price, mean_price,
                median_price, p10, p90, trimmed_mean, evidence_files,
                first_seen, last_seen
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(&run.computed_at)
        .bind(&s.canonical_key)
        .bind(&s.product_id)
        .bind(&s.brand)
        .bind(&s.model)
        .bind(&s.size)
        .bind(s.n_listings as i64)
        .bind(s.marketplaces.join(","))
        .bind(s.min_price)
        .bind(s.max_price)
        .bind(s.mean_price)
        .bind(s.median_price)
        .bind(s.p10)
        .bind(s.p90)
        .bind(s.trimmed_mean)
        .bind(s.evidence_files.join(","))
        .bind(s.first_seen.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
        .bind(s.last_seen.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
        .execute(&mut *tx)
        .await?;
        report.summaries_written += 1;
    }

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit output database: {}", path.display()))?;
    pool.close().await;

    Ok(report)
}

// ═══════════════════════════════════════════════════════════════════════
// Partitioning
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionAttr {
    Brand,
    Size,
    Model,
}

impl PartitionAttr {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionAttr::Brand => "brand",
            PartitionAttr::Size => "size",
            PartitionAttr::Model => "model",
        }
    }

    fn value<'a>(&self, listing: &'a CanonicalListing) -> &'a str {
        match self {
            PartitionAttr::Brand => &listing.brand,
            PartitionAttr::Size => &listing.size,
            PartitionAttr::Model => &listing.model,
        }
    }
}

/// Parse `--split-by` (`brand,size`). Order is kept; repeats are ignored.
pub fn parse_split_by(spec: &str) -> Result<Vec<PartitionAttr>, UnifyError> {
    let mut attrs = Vec::new();
    for part in spec.split(',').map(|p| p.trim().to_lowercase()) {
        if part.is_empty() {
            continue;
        }
        let attr = match part.as_str() {
            "brand" => PartitionAttr::Brand,
            "size" => PartitionAttr::Size,
            "model" => PartitionAttr::Model,
            other => {
                return Err(UnifyError::InvalidPartition(format!(
                    "unknown attribute '{}' in --split-by (expected brand, size, model)",
                    other
                )))
            }
        };
        if !attrs.contains(&attr) {
            attrs.push(attr);
        }
    }
    if attrs.is_empty() {
        return Err(UnifyError::InvalidPartition(
            "--split-by needs at least one of brand, size, model".to_string(),
        ));
    }
    Ok(attrs)
}

/// File name for one partition: `brand=dunlop__size=195-65R15.sqlite`.
pub fn partition_file_name(attrs: &[PartitionAttr], listing: &CanonicalListing) -> String {
    let parts: Vec<String> = attrs
        .iter()
        .map(|a| format!("{}={}", a.as_str(), safe_part(a.value(listing))))
        .collect();
    format!("{}.sqlite", parts.join("__"))
}

/// Group listings by partition file name, each group in input order.
pub fn partition<'a>(
    listings: &'a [CanonicalListing],
    attrs: &[PartitionAttr],
) -> BTreeMap<String, Vec<&'a CanonicalListing>> {
    let mut groups: BTreeMap<String, Vec<&CanonicalListing>> = BTreeMap::new();
    for listing in listings {
        groups
            .entry(partition_file_name(attrs, listing))
            .or_default()
            .push(listing);
    }
    groups
}

/// The partition output must be a directory. An existing regular file, or
/// a path that looks like a database file, is rejected.
pub fn check_partition_dir(output: &Path) -> Result<PathBuf, UnifyError> {
    if output.is_file() {
        return Err(UnifyError::InvalidPartition(format!(
            "--split-by needs a directory output, but {} is a file",
            output.display()
        )));
    }
    if !output.exists() {
        let ext = output
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if matches!(ext.as_str(), "sqlite" | "sqlite3" | "db") {
            return Err(UnifyError::InvalidPartition(format!(
                "--split-by needs a directory output, but {} looks like a database file",
                output.display()
            )));
        }
    }
    Ok(output.to_path_buf())
}

/// Whether `name` looks like a partition store: `attr=value[__attr=value...].sqlite`.
fn is_partition_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".sqlite") else {
        return false;
    };
    stem.split("__").all(|part| {
        part.split_once('=')
            .map(|(attr, _)| matches!(attr, "brand" | "size" | "model"))
            .unwrap_or(false)
    })
}

/// Delete partition stores in `dir` that are not in `keep`, with their
/// `-wal`/`-shm` side files. Other files are left alone. Returns the
/// number of stores removed.
pub fn remove_stale_partitions(dir: &Path, keep: &[PathBuf]) -> Result<usize> {
    let keep: Vec<&std::ffi::OsStr> = keep.iter().filter_map(|p| p.file_name()).collect();
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list partition directory {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !is_partition_file_name(name) || keep.contains(&file_name.as_os_str()) {
            continue;
        }

        std::fs::remove_file(entry.path())
            .with_context(|| format!("Failed to remove stale partition {}", entry.path().display()))?;
        for suffix in ["-wal", "-shm"] {
            let side = dir.join(format!("{}{}", name, suffix));
            if side.exists() {
                std::fs::remove_file(&side)?;
            }
        }
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeyTier, NormalizedListing};
    use sqlx::Row;
    use tempfile::TempDir;

    fn item(brand: &str, size: &str, model: &str, url: &str) -> CanonicalListing {
        CanonicalListing {
            listing: NormalizedListing {
                marketplace: "ml".into(),
                title: format!("Pneu {} {} {}", brand, model, size),
                price: Some(200.0),
                url: Some(url.into()),
                brand_raw: None,
                model_raw: None,
                size_raw: None,
                seller: None,
                sku: None,
                collected_at: None,
                source_file: "ml/a.csv".into(),
            },
            brand: brand.into(),
            model: model.into(),
            size: size.into(),
            canonical_key: format!("{}|{}|{}", brand, size, model),
            key_tier: KeyTier::Structured,
        }
    }

    async fn count(path: &Path, table: &str) -> i64 {
        let pool = db::connect(path).await.unwrap();
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(&pool)
            .await
            .unwrap();
        let n: i64 = row.get("n");
        pool.close().await;
        n
    }

    #[test]
    fn test_listing_id_is_content_hash() {
        let a = item("dunlop", "195/65R15", "sp touring", "https://x/1");
        let b = item("dunlop", "195/65R15", "sp touring", "https://x/2");
        assert_eq!(listing_id(&a), listing_id(&a.clone()));
        assert_ne!(listing_id(&a), listing_id(&b));
        assert_eq!(listing_id(&a).len(), 64);
    }

    #[tokio::test]
    async fn test_replace_then_append_is_idempotent_for_listings() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.sqlite");
        let listings = vec![
            item("dunlop", "195/65R15", "sp touring", "https://x/1"),
            item("dunlop", "195/65R15", "sp touring", "https://x/2"),
        ];
        let summaries = crate::aggregate::summarize(&listings);

        let first = write_store(&path, &listings, &summaries, WriteMode::Replace, &RunInfo::new())
            .await
            .unwrap();
        assert_eq!(first.listings_written, 2);
        assert_eq!(first.summaries_written, 1);

        let second = write_store(&path, &listings, &summaries, WriteMode::Append, &RunInfo::new())
            .await
            .unwrap();
        assert_eq!(second.listings_written, 0);
        assert_eq!(count(&path, "unified_listings").await, 2);
        // Each run keeps its own summary rows.
        assert_eq!(count(&path, "canonical_summary").await, 2);

        write_store(&path, &listings[..1], &summaries, WriteMode::Replace, &RunInfo::new())
            .await
            .unwrap();
        assert_eq!(count(&path, "unified_listings").await, 1);
        assert_eq!(count(&path, "canonical_summary").await, 1);
    }

    #[test]
    fn test_parse_split_by() {
        assert_eq!(
            parse_split_by("brand, size").unwrap(),
            vec![PartitionAttr::Brand, PartitionAttr::Size]
        );
        assert_eq!(
            parse_split_by("model,brand,model").unwrap(),
            vec![PartitionAttr::Model, PartitionAttr::Brand]
        );
        assert!(matches!(
            parse_split_by("brand,color"),
            Err(UnifyError::InvalidPartition(_))
        ));
        assert!(matches!(
            parse_split_by(" , "),
            Err(UnifyError::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_partition_file_names() {
        let attrs = vec![PartitionAttr::Brand, PartitionAttr::Size];
        let a = item("dunlop", "195/65R15", "sp touring", "https://x/1");
        let b = item("", "", "", "https://x/2");
        assert_eq!(partition_file_name(&attrs, &a), "brand=dunlop__size=195-65R15.sqlite");
        assert_eq!(partition_file_name(&attrs, &b), "brand=NA__size=NA.sqlite");

        let listings = vec![a.clone(), b, a];
        let groups = partition(&listings, &attrs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["brand=dunlop__size=195-65R15.sqlite"].len(), 2);
    }

    #[test]
    fn test_partition_output_must_be_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("out.sqlite");
        assert!(check_partition_dir(&file).is_err());
        std::fs::write(tmp.path().join("plain"), "x").unwrap();
        assert!(check_partition_dir(&tmp.path().join("plain")).is_err());
        assert!(check_partition_dir(&tmp.path().join("parts")).is_ok());
        assert!(check_partition_dir(tmp.path()).is_ok());
    }

    #[test]
    fn test_partition_file_name_shape() {
        assert!(is_partition_file_name("brand=dunlop.sqlite"));
        assert!(is_partition_file_name("brand=dunlop__size=195-65R15.sqlite"));
        assert!(!is_partition_file_name("catalog.sqlite"));
        assert!(!is_partition_file_name("brand=dunlop.csv"));
        assert!(!is_partition_file_name("color=red.sqlite"));
    }

    #[test]
    fn test_remove_stale_partitions_keeps_current_and_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        for name in [
            "brand=dunlop.sqlite",
            "brand=pirelli.sqlite",
            "brand=pirelli.sqlite-wal",
            "notes.txt",
            "catalog.sqlite",
        ] {
            std::fs::write(dir.join(name), "x").unwrap();
        }

        let removed = remove_stale_partitions(dir, &[dir.join("brand=dunlop.sqlite")]).unwrap();

        assert_eq!(removed, 1);
        assert!(dir.join("brand=dunlop.sqlite").exists());
        assert!(!dir.join("brand=pirelli.sqlite").exists());
        assert!(!dir.join("brand=pirelli.sqlite-wal").exists());
        assert!(dir.join("notes.txt").exists());
        assert!(dir.join("catalog.sqlite").exists());
    }
}
