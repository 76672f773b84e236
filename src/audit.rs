//! Data-quality audit of an output store.
//!
//! Reports how often each listing column is empty (NULL or blank), how
//! the extracted brand/model/size and the seller are covered per
//! marketplace, and how many listings only got a fallback key.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;

/// Listing columns whose emptiness is reported.
pub const AUDITED_COLUMNS: &[&str] = &[
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
    "brand",
    "model",
    "size",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnQuality {
    pub column: String,
    pub missing: i64,
    pub missing_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceQuality {
    pub marketplace: String,
    pub rows: i64,
    pub missing_brand: f64,
    pub missing_model: f64,
    pub missing_size: f64,
    pub missing_seller: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub total: i64,
    pub fallback_keys: i64,
    pub columns: Vec<ColumnQuality>,
    pub marketplaces: Vec<MarketplaceQuality>,
}

fn missing_expr(column: &str) -> String {
    format!("({c} IS NULL OR TRIM(CAST({c} AS TEXT)) = '')", c = column)
}

fn rate(part: i64, total: i64) -> f64 {
    if total > 0 {
        part as f64 / total as f64
    } else {
        0.0
    }
}

pub async fn collect_audit(pool: &SqlitePool) -> Result<AuditReport> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_listings")
        .fetch_one(pool)
        .await?;

    let fallback_keys: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM unified_listings WHERE key_tier = 'fallback'",
    )
    .fetch_one(pool)
    .await?;

    let mut columns = Vec::with_capacity(AUDITED_COLUMNS.len());
    for column in AUDITED_COLUMNS {
        let sql = format!(
            "SELECT COUNT(*) FROM unified_listings WHERE {}",
            missing_expr(column)
        );
        let missing: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        columns.push(ColumnQuality {
            column: column.to_string(),
            missing,
            missing_rate: rate(missing, total),
        });
    }

    let sql = format!(
        r#"
        SELECT
            marketplace,
            COUNT(*) AS rows,
            SUM(CASE WHEN {brand} THEN 1 ELSE 0 END) AS no_brand,
            SUM(CASE WHEN {model} THEN 1 ELSE 0 END) AS no_model,
            SUM(CASE WHEN {size} THEN 1 ELSE 0 END) AS no_size,
            SUM(CASE WHEN {seller} THEN 1 ELSE 0 END) AS no_seller
        FROM unified_listings
        GROUP BY marketplace
        ORDER BY rows DESC, marketplace
        "#,
        brand = missing_expr("brand"),
        model = missing_expr("model"),
        size = missing_expr("size"),
        seller = missing_expr("seller"),
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let marketplaces = rows
        .iter()
        .map(|row| {
            let n: i64 = row.get("rows");
            MarketplaceQuality {
                marketplace: row.get("marketplace"),
                rows: n,
                missing_brand: rate(row.get("no_brand"), n),
                missing_model: rate(row.get("no_model"), n),
                missing_size: rate(row.get("no_size"), n),
                missing_seller: rate(row.get("no_seller"), n),
            }
        })
        .collect();

    Ok(AuditReport {
        total,
        fallback_keys,
        columns,
        marketplaces,
    })
}

/// Run the audit command and print the report.
pub async fn run_audit(db_path: &Path) -> Result<()> {
    let pool = db::connect_read_only(db_path).await?;
    let report = collect_audit(&pool).await?;
    pool.close().await;

    println!("Tire Unifier — Data Quality");
    println!("===========================");
    println!();
    println!("  Listings:       {}", report.total);
    println!(
        "  Fallback keys:  {} ({:.1}%)",
        report.fallback_keys,
        rate(report.fallback_keys, report.total) * 100.0
    );
    println!();
    println!("  Missing values:");
    println!("  {:<14} {:>8} {:>8}", "COLUMN", "MISSING", "RATE");
    println!("  {}", "-".repeat(32));
    for c in &report.columns {
        println!(
            "  {:<14} {:>8} {:>7.1}%",
            c.column,
            c.missing,
            c.missing_rate * 100.0
        );
    }

    if !report.marketplaces.is_empty() {
        println!();
        println!("  By marketplace (missing rate):");
        println!(
            "  {:<24} {:>7} {:>7} {:>7} {:>7} {:>7}",
            "MARKETPLACE", "ROWS", "BRAND", "MODEL", "SIZE", "SELLER"
        );
        println!("  {}", "-".repeat(64));
        for m in &report.marketplaces {
            let name = if m.marketplace.is_empty() {
                "(unknown)"
            } else {
                m.marketplace.as_str()
            };
            println!(
                "  {:<24} {:>7} {:>6.1}% {:>6.1}% {:>6.1}% {:>6.1}%",
                name,
                m.rows,
                m.missing_brand * 100.0,
                m.missing_model * 100.0,
                m.missing_size * 100.0,
                m.missing_seller * 100.0
            );
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalListing, KeyTier, NormalizedListing};
    use crate::persist::{write_store, RunInfo, WriteMode};
    use tempfile::TempDir;

    fn item(marketplace: &str, url: &str, brand: &str, seller: Option<&str>) -> CanonicalListing {
        let tier = if brand.is_empty() {
            KeyTier::Fallback
        } else {
            KeyTier::Structured
        };
        CanonicalListing {
            listing: NormalizedListing {
                marketplace: marketplace.into(),
                title: "Pneu".into(),
                price: None,
                url: Some(url.into()),
                brand_raw: None,
                model_raw: None,
                size_raw: None,
                seller: seller.map(str::to_string),
                sku: None,
                collected_at: None,
                source_file: "a.csv".into(),
            },
            brand: brand.into(),
            model: String::new(),
            size: "195/65R15".into(),
            canonical_key: if brand.is_empty() {
                "fb|pneu".into()
            } else {
                format!("{}|195/65R15|unk", brand)
            },
            key_tier: tier,
        }
    }

    #[tokio::test]
    async fn test_audit_rates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.sqlite");
        let listings = vec![
            item("ml", "https://ml/1", "dunlop", Some("Loja A")),
            item("ml", "https://ml/2", "", None),
            item("magalu", "https://magalu/1", "pirelli", Some("  ")),
        ];
        write_store(&path, &listings, &[], WriteMode::Replace, &RunInfo::new())
            .await
            .unwrap();

        let pool = db::connect_read_only(&path).await.unwrap();
        let report = collect_audit(&pool).await.unwrap();
        pool.close().await;

        assert_eq!(report.total, 3);
        assert_eq!(report.fallback_keys, 1);

        let col = |name: &str| report.columns.iter().find(|c| c.column == name).unwrap().clone();
        assert_eq!(col("price").missing, 3);
        assert_eq!(col("url").missing, 0);
        assert_eq!(col("brand").missing, 1);
        assert_eq!(col("seller").missing, 2);
        assert_eq!(col("model").missing_rate, 1.0);

        let ml = report
            .marketplaces
            .iter()
            .find(|m| m.marketplace == "ml")
            .unwrap();
        assert_eq!(ml.rows, 2);
        assert_eq!(ml.missing_brand, 0.5);
        assert_eq!(ml.missing_size, 0.0);
        assert_eq!(report.marketplaces[0].marketplace, "ml");
    }
}
